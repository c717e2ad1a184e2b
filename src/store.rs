//! The original/working pair for one open document.
//!
//! `original` is what the server last returned and is only replaced by a
//! fetch or a successful save. Every edit builds a new working copy.
use crate::diff::{self, ChangeLogItem};
use crate::document::{Document, EDITABLE_FIELDS};
use crate::error::{DocumentError, PathError};
use crate::path::{self, Path};
use crate::revision::Revision;
use crate::types::TimeStamp;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct DocumentStore {
    original: Document,
    working: Document,
}

impl DocumentStore {
    pub fn new(document: Document) -> Self {
        Self {
            working: document.clone(),
            original: document,
        }
    }

    pub fn original(&self) -> &Document {
        &self.original
    }

    pub fn working(&self) -> &Document {
        &self.working
    }

    /// Write `value` at `path` into a fresh copy of the working document.
    ///
    /// Only the editable fields may be targeted, and the result has to still
    /// read as a document. On any error the working copy is left as it was.
    pub fn set_field(&mut self, path: &Path, value: Value) -> Result<(), DocumentError> {
        if path.is_empty() {
            return Err(PathError::Empty.into());
        }
        match path.first_key() {
            Some(root) if EDITABLE_FIELDS.contains(&root) => {}
            _ => return Err(DocumentError::ProtectedField(path.to_string())),
        }

        let mut draft = self.working.to_value()?;
        path::set_at(&mut draft, path, value)?;
        self.working = Document::from_value(draft)?;

        Ok(())
    }

    pub fn reset_to_original(&mut self) {
        self.working = self.original.clone();
    }

    /// Replace the working payload with a copy of the revision's snapshot.
    /// Status, identity and history are left alone.
    pub fn load_from_revision(&mut self, revision: &Revision) -> Result<(), DocumentError> {
        if !revision.verify() {
            return Err(DocumentError::CorruptRevision(revision.id()));
        }
        self.working.data = revision.snapshot().clone();
        Ok(())
    }

    /// Append a captured revision to the working history. Revisions are never
    /// reordered or removed here.
    pub fn push_revision(&mut self, revision: Revision) {
        self.working.revisions.push(revision);
    }

    /// Take a server-confirmed document as the new baseline.
    pub fn commit(&mut self, document: Document) {
        self.working = document.clone();
        self.original = document;
    }

    pub fn mark_client_viewed(&mut self) {
        self.original.status.client_viewed = true;
        self.working.status.client_viewed = true;
    }

    pub fn changes(&self) -> Vec<ChangeLogItem> {
        diff::compute_diff(&self.original.tracked_view(), &self.working.tracked_view())
    }

    pub fn changes_at(&self, at: TimeStamp) -> Vec<ChangeLogItem> {
        diff::compute_diff_at(
            &self.original.tracked_view(),
            &self.working.tracked_view(),
            at,
        )
    }

    pub fn is_dirty(&self) -> bool {
        !self.changes().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> DocumentStore {
        let doc = Document::from_value(json!({
            "hash": "doc_1abc",
            "id": 1,
            "data": {
                "paymentTerms": "30 days",
                "addedProducts": [{"id": 1, "name": "Pump", "price": 1000, "discount": 0}]
            }
        }))
        .unwrap();
        DocumentStore::new(doc)
    }

    #[test]
    fn edits_never_reach_the_original() {
        let mut store = store();
        let before = store.original().clone();

        store
            .set_field(&Path::parse("data.addedProducts[0].discount").unwrap(), json!(10))
            .unwrap();
        store
            .set_field(&Path::parse("note").unwrap(), json!("call first"))
            .unwrap();

        assert_eq!(store.original(), &before);
        assert_eq!(store.working().data["addedProducts"][0]["discount"], json!(10));
        assert_eq!(store.working().note, "call first");
    }

    #[test]
    fn protected_fields_are_refused() {
        let mut store = store();
        for raw in ["status.REJECTED", "hash", "revisions[0]", "otp"] {
            let result = store.set_field(&Path::parse(raw).unwrap(), json!(true));
            assert!(
                matches!(result, Err(DocumentError::ProtectedField(_))),
                "{raw} should be protected"
            );
        }
        assert!(!store.is_dirty());
    }

    #[test]
    fn ill_typed_write_leaves_working_copy_alone() {
        let mut store = store();
        let result = store.set_field(&Path::parse("note").unwrap(), json!({"not": "text"}));

        assert!(matches!(result, Err(DocumentError::InvalidField(_))));
        assert_eq!(store.working(), store.original());
    }

    #[test]
    fn discount_accepts_falsy_values() {
        let mut store = store();
        store
            .set_field(&Path::parse("discount").unwrap(), Value::Null)
            .unwrap();
        assert!(!store.is_dirty());
    }

    #[test]
    fn unparsable_discount_is_refused() {
        let mut store = store();
        store
            .set_field(&Path::parse("discount").unwrap(), json!(2.5))
            .unwrap();
        let before = store.working().clone();

        for bad in [json!("abc"), json!([1]), json!({"amount": 3})] {
            let result = store.set_field(&Path::parse("discount").unwrap(), bad);
            assert!(matches!(result, Err(DocumentError::InvalidField(_))));
            assert_eq!(store.working(), &before);
        }

        store
            .set_field(&Path::parse("discount").unwrap(), json!("7.5"))
            .unwrap();
        assert_eq!(store.working().discount.to_string(), "7.5");
    }

    #[test]
    fn far_index_is_refused_without_growing_the_list() {
        let mut store = store();
        for raw in [
            "data.addedProducts[18446744073709551615].name",
            "data.addedProducts[100000000].name",
        ] {
            let result = store.set_field(&Path::parse(raw).unwrap(), json!("x"));
            assert!(matches!(
                result,
                Err(DocumentError::Path(PathError::IndexOutOfRange { len: 1, .. }))
            ));
        }
        assert_eq!(store.working(), store.original());

        store
            .set_field(&Path::parse("data.addedProducts[1].name").unwrap(), json!("Valve"))
            .unwrap();
        assert_eq!(store.working().data["addedProducts"][1]["name"], json!("Valve"));
    }

    #[test]
    fn index_on_an_object_keeps_its_fields() {
        let doc = Document::from_value(json!({
            "hash": "doc_1abc",
            "id": 1,
            "data": {"quoteHeadDetails": {"company": "ACME", "description": "d"}}
        }))
        .unwrap();
        let mut store = DocumentStore::new(doc);

        let path = Path::from_parts(["data", "quoteHeadDetails", "0"]).unwrap();
        store.set_field(&path, json!("x")).unwrap();

        let header = &store.working().data["quoteHeadDetails"];
        assert_eq!(header["company"], json!("ACME"));
        assert_eq!(header["description"], json!("d"));
        assert_eq!(header["0"], json!("x"));
    }

    #[test]
    fn reset_discards_every_edit() {
        let mut store = store();
        store
            .set_field(&Path::parse("data.paymentTerms").unwrap(), json!("60 days"))
            .unwrap();
        assert!(store.is_dirty());

        store.reset_to_original();

        assert_eq!(store.working(), store.original());
        assert!(store.changes().is_empty());
    }

    #[test]
    fn commit_closes_the_diff_window() {
        let mut store = store();
        store
            .set_field(&Path::parse("data.paymentTerms").unwrap(), json!("60 days"))
            .unwrap();

        let saved = store.working().clone();
        store.commit(saved);

        assert!(store.changes().is_empty());
        assert_eq!(store.original().data["paymentTerms"], json!("60 days"));
    }
}
