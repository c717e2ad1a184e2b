//! Frozen point-in-time copies of a document payload
use crate::actor::Actor;
use crate::diff::ChangeLogItem;
use crate::document::Document;
use crate::error::DocumentError;
use crate::store::DocumentStore;
use crate::types::TimeStamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A revision is written once and never edited. Its change list is the diff
/// at the time it was captured, not a live view.
#[derive(
    minicbor::Encode, minicbor::Decode, Serialize, Deserialize, Debug, Clone, PartialEq,
)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    #[n(0)]
    id: u32,
    #[n(1)]
    #[serde(default)]
    label: Option<String>,
    #[n(2)]
    actor: Actor,
    #[cbor(n(3), with = "crate::codec::json")]
    snapshot: Value,
    #[n(4)]
    timestamp: TimeStamp,
    #[n(5)]
    #[serde(default)]
    changes: Vec<ChangeLogItem>,
    #[n(6)]
    #[serde(default)]
    digest: String,
}

impl Revision {
    pub fn id(&self) -> u32 {
        self.id
    }
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
    pub fn actor(&self) -> &Actor {
        &self.actor
    }
    pub fn snapshot(&self) -> &Value {
        &self.snapshot
    }
    pub fn timestamp(&self) -> TimeStamp {
        self.timestamp
    }
    pub fn changes(&self) -> &[ChangeLogItem] {
        &self.changes
    }
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Recompute the snapshot digest. Revisions stored without one pass.
    pub fn verify(&self) -> bool {
        if self.digest.is_empty() {
            return true;
        }
        snapshot_digest(&self.snapshot).is_ok_and(|digest| digest == self.digest)
    }
}

/// SHA-256 over the CBOR encoding of a payload.
pub fn snapshot_digest(snapshot: &Value) -> Result<String, DocumentError> {
    let mut encoder = minicbor::Encoder::new(Vec::new());
    crate::codec::json::encode(snapshot, &mut encoder, &mut ())
        .map_err(|err| DocumentError::Encoding(err.to_string()))?;

    Ok(sha256::digest(encoder.into_writer()))
}

/// Capture the working payload as the next revision.
///
/// With `require_changes` set an unchanged working copy is refused; plain
/// saves never go through this check.
pub fn create_revision(
    store: &DocumentStore,
    actor: &Actor,
    label: Option<&str>,
    require_changes: bool,
) -> Result<Revision, DocumentError> {
    let changes = store.changes();
    if require_changes && changes.is_empty() {
        return Err(DocumentError::NoChanges);
    }

    let working = store.working();
    let snapshot = working.data.clone();
    let digest = snapshot_digest(&snapshot)?;

    Ok(Revision {
        id: working.revisions.len() as u32,
        label: label
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(str::to_owned),
        actor: *actor,
        snapshot,
        timestamp: TimeStamp::new(),
        changes,
        digest,
    })
}

pub fn select_revision(document: &Document, id: u32) -> Result<&Revision, DocumentError> {
    document.revision(id).ok_or(DocumentError::RevisionNotFound(id))
}

pub fn apply_revision(store: &mut DocumentStore, revision: &Revision) -> Result<(), DocumentError> {
    store.load_from_revision(revision)
}
