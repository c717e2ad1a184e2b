//! sled-backed document gateway.
//!
//! Documents are CBOR encoded under `document/<hash>`, with an `id/<id>`
//! index entry pointing back at the hash. Both keys are always written in one
//! batch.
use crate::config::Config;
use crate::document::{Document, NewDocument};
use crate::error::GatewayError;
use crate::gateway::{DocumentGateway, SaveRequest};
use crate::types::{ArtifactKind, PdfArtifact, TimeStamp};
use crate::utils;
use anyhow::Context;
use sled::Batch;
use std::sync::Arc;
use tracing::{debug, info};

const DOCUMENT_PREFIX: &str = "document/";
const ID_PREFIX: &str = "id/";

fn document_key(hash: &str) -> String {
    format!("{DOCUMENT_PREFIX}{hash}")
}

fn id_key(id: u64) -> String {
    format!("{ID_PREFIX}{id}")
}

pub struct SledGateway {
    instance: Arc<sled::Db>,
    config: Config,
}

impl SledGateway {
    pub fn new(instance: Arc<sled::Db>, config: Config) -> Self {
        Self { instance, config }
    }

    pub fn open(config: Config) -> anyhow::Result<Self> {
        let db = sled::open(&config.db_path)
            .with_context(|| format!("failed to open {}", config.db_path.display()))?;
        Ok(Self::new(Arc::new(db), config))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn load(&self, hash: &str) -> anyhow::Result<Option<Document>> {
        let Some(bytes) = self.instance.get(document_key(hash).as_bytes())? else {
            return Ok(None);
        };
        let document = minicbor::decode(&bytes)
            .with_context(|| format!("failed to decode document {hash}"))?;
        Ok(Some(document))
    }

    fn load_existing(&self, hash: &str) -> Result<Document, GatewayError> {
        self.load(hash)?
            .ok_or_else(|| GatewayError::NotFound(hash.to_owned()))
    }

    fn store(&self, document: &Document) -> anyhow::Result<()> {
        let mut batch = Batch::default();
        batch.insert(
            document_key(&document.hash).as_bytes(),
            minicbor::to_vec(document)?,
        );
        batch.insert(id_key(document.id).as_bytes(), document.hash.as_bytes());
        self.instance.apply_batch(batch)?;
        Ok(())
    }

    /// Load, refuse if the document is rejected, change, stamp and store.
    fn update<F>(&self, hash: &str, change: F) -> Result<Document, GatewayError>
    where
        F: FnOnce(&mut Document) -> Result<(), GatewayError>,
    {
        let mut document = self.load_existing(hash)?;
        if document.status.rejected {
            return Err(GatewayError::Rejected("document is read-only".into()));
        }
        change(&mut document)?;
        document.updated_at = TimeStamp::new();
        self.store(&document)?;
        Ok(document)
    }
}

impl DocumentGateway for SledGateway {
    fn fetch_document(&self, hash: &str) -> Result<Document, GatewayError> {
        self.load_existing(hash)
    }

    fn list_documents(&self) -> Result<Vec<Document>, GatewayError> {
        let mut documents = vec![];
        for entry in self.instance.scan_prefix(DOCUMENT_PREFIX.as_bytes()) {
            let (key, bytes) = entry.context("failed to scan documents")?;
            let document: Document = minicbor::decode(&bytes).with_context(|| {
                format!("failed to decode {}", String::from_utf8_lossy(&key))
            })?;
            documents.push(document);
        }
        documents.sort_by_key(|document| document.id);
        Ok(documents)
    }

    fn create_document(&self, draft: NewDocument) -> Result<Document, GatewayError> {
        let now = TimeStamp::new();
        let document = Document {
            hash: utils::new_uuid_to_bech32(&self.config.hash_prefix)?,
            id: self.instance.generate_id().context("failed to allocate id")?,
            company: draft.company,
            otp: utils::new_otp(self.config.otp_digits),
            status: Default::default(),
            data: draft.data,
            revisions: vec![],
            pdf_urls: vec![],
            note: draft.note,
            discount: draft.discount,
            created_at: now,
            updated_at: now,
            expires_at: Some(now.plus_days(self.config.expiry_days)),
            date_of_signature: None,
        };
        self.store(&document)?;

        info!(hash = %document.hash, id = document.id, "document created");
        Ok(document)
    }

    fn delete_documents(&self, ids: &[u64]) -> Result<usize, GatewayError> {
        let mut batch = Batch::default();
        let mut removed = 0;
        for id in ids {
            let Some(hash) = self
                .instance
                .get(id_key(*id).as_bytes())
                .context("failed to read id index")?
            else {
                continue;
            };
            batch.remove(id_key(*id).as_bytes());
            batch.remove([DOCUMENT_PREFIX.as_bytes(), hash.as_ref()].concat());
            removed += 1;
        }
        self.instance.apply_batch(batch).context("failed to delete")?;

        info!(requested = ids.len(), removed, "documents deleted");
        Ok(removed)
    }

    fn persist_document(
        &self,
        hash: &str,
        request: &SaveRequest,
    ) -> Result<Document, GatewayError> {
        let incoming = &request.document;
        self.update(hash, |stored| {
            if stored.status.finalized {
                return Err(GatewayError::Rejected("document is finalized".into()));
            }
            // history is append-only
            if !incoming.revisions.starts_with(&stored.revisions) {
                return Err(GatewayError::Rejected(
                    "revision history cannot be rewritten".into(),
                ));
            }

            stored.data = incoming.data.clone();
            stored.note = incoming.note.clone();
            stored.discount = incoming.discount;
            stored.expires_at = incoming.expires_at;
            stored.date_of_signature = incoming.date_of_signature;
            stored.revisions = incoming.revisions.clone();
            // an employee save hands the turn to the client and back again
            stored.status.your_turn = request.actor.is_employee();

            debug!(
                hash,
                actor = ?request.actor,
                label = %request.revision.label,
                revisions = stored.revisions.len(),
                "document persisted"
            );
            Ok(())
        })
    }

    fn confirm_document(&self, hash: &str) -> Result<(), GatewayError> {
        self.update(hash, |stored| {
            if stored.status.finalized {
                return Err(GatewayError::Rejected("document is already finalized".into()));
            }
            stored.date_of_signature = Some(TimeStamp::new());
            Ok(())
        })?;
        Ok(())
    }

    fn reject_document(&self, hash: &str) -> Result<Document, GatewayError> {
        self.update(hash, |stored| {
            if stored.status.finalized {
                return Err(GatewayError::Rejected("document is finalized".into()));
            }
            stored.status.rejected = true;
            stored.status.your_turn = false;
            Ok(())
        })
    }

    fn mark_client_viewed(&self, hash: &str) -> Result<(), GatewayError> {
        self.update(hash, |stored| {
            stored.status.client_viewed = true;
            Ok(())
        })?;
        Ok(())
    }

    fn generate_artifact(&self, hash: &str, kind: ArtifactKind) -> Result<(), GatewayError> {
        let base_url = self.config.artifact_base_url.trim_end_matches('/');
        self.update(hash, |stored| {
            let name = format!("{}-{}", kind.as_str(), stored.pdf_urls.len() + 1);
            stored.pdf_urls.push(PdfArtifact {
                url: format!("{base_url}/{hash}/{name}.pdf"),
                name,
                timestamp: TimeStamp::new(),
            });
            if kind == ArtifactKind::Confirmation {
                stored.status.finalized = true;
                stored.status.your_turn = false;
            }
            Ok(())
        })?;

        info!(hash, kind = kind.as_str(), "artifact generated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Actor;
    use crate::gateway::RevisionLabel;
    use serde_json::json;
    use tempfile::tempdir;

    fn gateway() -> anyhow::Result<(tempfile::TempDir, SledGateway)> {
        let temp_dir = tempdir()?;
        let config = Config::default().with_db_path(temp_dir.path().join("storage.db"));
        let gateway = SledGateway::open(config)?;
        Ok((temp_dir, gateway))
    }

    #[test]
    fn create_then_fetch() -> anyhow::Result<()> {
        let (_dir, gateway) = gateway()?;
        let created = gateway.create_document(NewDocument::new(json!({"paymentTerms": "30 days"})))?;

        assert!(created.hash.starts_with("doc_1"));
        assert_eq!(created.otp.len(), 6);
        assert!(created.expires_at.is_some());

        let fetched = gateway.fetch_document(&created.hash)?;
        assert_eq!(created, fetched);
        Ok(())
    }

    #[test]
    fn missing_document_is_not_found() -> anyhow::Result<()> {
        let (_dir, gateway) = gateway()?;
        assert!(matches!(
            gateway.fetch_document("doc_1missing"),
            Err(GatewayError::NotFound(_))
        ));
        Ok(())
    }

    #[test]
    fn delete_removes_by_id() -> anyhow::Result<()> {
        let (_dir, gateway) = gateway()?;
        let a = gateway.create_document(NewDocument::new(json!({})))?;
        let b = gateway.create_document(NewDocument::new(json!({})))?;

        let removed = gateway.delete_documents(&[a.id, 9_999])?;

        assert_eq!(removed, 1);
        let left = gateway.list_documents()?;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].hash, b.hash);
        Ok(())
    }

    #[test]
    fn persist_refuses_rewritten_history() -> anyhow::Result<()> {
        let (_dir, gateway) = gateway()?;
        let created = gateway.create_document(NewDocument::new(json!({})))?;

        let mut with_history = created.clone();
        let store = crate::store::DocumentStore::new(created.clone());
        let revision =
            crate::revision::create_revision(&store, &Actor::employee(1), Some("first"), false)?;
        with_history.revisions.push(revision);

        let request = SaveRequest {
            document: with_history,
            actor: Actor::employee(1),
            revision: RevisionLabel {
                label: "first".into(),
            },
        };
        let saved = gateway.persist_document(&created.hash, &request)?;
        assert_eq!(saved.revisions.len(), 1);
        assert!(saved.status.your_turn);

        let rewind = SaveRequest {
            document: created.clone(),
            actor: Actor::client(3),
            revision: RevisionLabel::default(),
        };
        assert!(matches!(
            gateway.persist_document(&created.hash, &rewind),
            Err(GatewayError::Rejected(_))
        ));
        Ok(())
    }

    #[test]
    fn confirmation_artifact_finalizes() -> anyhow::Result<()> {
        let (_dir, gateway) = gateway()?;
        let created = gateway.create_document(NewDocument::new(json!({})))?;

        gateway.confirm_document(&created.hash)?;
        gateway.generate_artifact(&created.hash, ArtifactKind::Confirmation)?;

        let fetched = gateway.fetch_document(&created.hash)?;
        assert!(fetched.status.finalized);
        assert!(fetched.date_of_signature.is_some());
        assert_eq!(fetched.pdf_urls.len(), 1);
        assert!(fetched.pdf_urls[0].url.ends_with("/confirmation-1.pdf"));

        assert!(gateway.confirm_document(&created.hash).is_err());
        Ok(())
    }

    #[test]
    fn rejected_documents_are_read_only() -> anyhow::Result<()> {
        let (_dir, gateway) = gateway()?;
        let created = gateway.create_document(NewDocument::new(json!({})))?;

        let rejected = gateway.reject_document(&created.hash)?;
        assert!(rejected.status.rejected);

        assert!(matches!(
            gateway.mark_client_viewed(&created.hash),
            Err(GatewayError::Rejected(_))
        ));
        Ok(())
    }
}
