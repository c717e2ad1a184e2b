//! The request/response collaborator a session talks to.
//!
//! Implementations own persistence and status changes. A session only reads
//! status back from what these calls return.
use crate::actor::Actor;
use crate::document::{Document, NewDocument};
use crate::error::GatewayError;
use crate::types::ArtifactKind;
use serde::Serialize;

#[derive(Serialize, Debug, Clone, Default, Eq, PartialEq)]
pub struct RevisionLabel {
    /// Empty means save without naming a revision.
    pub label: String,
}

/// The payload of a save: the working document plus who saved it.
#[derive(Serialize, Debug, Clone)]
pub struct SaveRequest {
    #[serde(flatten)]
    pub document: Document,
    pub actor: Actor,
    pub revision: RevisionLabel,
}

pub trait DocumentGateway {
    fn fetch_document(&self, hash: &str) -> Result<Document, GatewayError>;

    fn list_documents(&self) -> Result<Vec<Document>, GatewayError>;

    fn create_document(&self, draft: NewDocument) -> Result<Document, GatewayError>;

    /// Returns how many of `ids` were removed.
    fn delete_documents(&self, ids: &[u64]) -> Result<usize, GatewayError>;

    fn persist_document(&self, hash: &str, request: &SaveRequest)
    -> Result<Document, GatewayError>;

    fn confirm_document(&self, hash: &str) -> Result<(), GatewayError>;

    fn reject_document(&self, hash: &str) -> Result<Document, GatewayError>;

    fn mark_client_viewed(&self, hash: &str) -> Result<(), GatewayError>;

    fn generate_artifact(&self, hash: &str, kind: ArtifactKind) -> Result<(), GatewayError>;
}
