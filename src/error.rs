use crate::lifecycle::{DisplayState, Transition};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum PathError {
    #[error("Path is empty")]
    Empty,
    #[error("Path `{0}` contains an empty segment")]
    EmptySegment(String),
    #[error("Path `{0}` has an unterminated index")]
    UnclosedIndex(String),
    #[error("Path `{path}` has an invalid index `{index}`")]
    InvalidIndex { path: String, index: String },
    #[error("Path `{path}` index {index} is past the end of a list of {len}")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },
    #[error("Path `{path}` uses key `{key}` on a list")]
    KeyOnList { path: String, key: String },
}

#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("Document {0} was not found")]
    NotFound(String),
    #[error("Not authorised to access this document")]
    Unauthorized,
    #[error("Request was rejected: {0}")]
    Rejected(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum DocumentError {
    #[error("No document is loaded in this session")]
    NotLoaded,
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("Field `{0}` cannot be edited")]
    ProtectedField(String),
    #[error("Field update rejected: {0}")]
    InvalidField(String),
    #[error("Document is read-only ({0:?})")]
    ReadOnly(DisplayState),
    #[error("{transition:?} is not allowed while the document is {state:?}")]
    TransitionNotAllowed {
        transition: Transition,
        state: DisplayState,
    },
    #[error("No actor resolved, viewer is read-only")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Revision {0} does not exist on this document")]
    RevisionNotFound(u32),
    #[error("A revision requires at least one change")]
    NoChanges,
    #[error("Failed to encode snapshot: {0}")]
    Encoding(String),
    #[error("Revision {0} snapshot does not match its digest")]
    CorruptRevision(u32),
    #[error("The passcode does not match")]
    InvalidOtp,
    #[error("Document expired")]
    Expired,
    #[error("Product {0} is not on this document")]
    ProductNotFound(usize),
    #[error("Component {component} is not on product {product}")]
    ComponentNotFound { product: usize, component: usize },
    #[error("Failed to fetch document: {0}")]
    Fetch(String),
    #[error("Failed to save document: {0}")]
    Save(String),
    #[error("Request failed: {0}")]
    Gateway(String),
}

impl DocumentError {
    /// Collapse a collaborator failure into a readable message, keeping the
    /// context chain.
    pub fn fetch(err: GatewayError) -> Self {
        Self::Fetch(format!("{err:#}"))
    }
    pub fn save(err: GatewayError) -> Self {
        Self::Save(format!("{err:#}"))
    }
    pub fn gateway(err: GatewayError) -> Self {
        Self::Gateway(format!("{err:#}"))
    }
}
