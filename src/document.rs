//! The quote document and the parts of it users may edit
use crate::actor::ClientRef;
use crate::error::DocumentError;
use crate::lifecycle::Status;
use crate::pricing::{self, Product, Totals, decimal_number};
use crate::revision::Revision;
use crate::types::{Company, PdfArtifact, TimeStamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Root fields a session may write and the change log tracks. Everything else
/// is owned by the server.
pub const EDITABLE_FIELDS: [&str; 5] = ["data", "note", "discount", "expiresAt", "dateOfSignature"];

#[derive(
    minicbor::Encode, minicbor::Decode, Serialize, Deserialize, Debug, Clone, PartialEq,
)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[n(0)]
    pub hash: String,
    #[n(1)]
    pub id: u64,
    #[n(2)]
    #[serde(default)]
    pub company: Company,
    #[n(3)]
    #[serde(default)]
    pub otp: String,
    #[n(4)]
    #[serde(default)]
    pub status: Status,
    #[cbor(n(5), with = "crate::codec::json")]
    #[serde(default)]
    pub data: Value,
    #[n(6)]
    #[serde(default)]
    pub revisions: Vec<Revision>,
    #[n(7)]
    #[serde(default)]
    pub pdf_urls: Vec<PdfArtifact>,
    #[n(8)]
    #[serde(default)]
    pub note: String,
    #[cbor(n(9), with = "crate::codec::decimal")]
    #[serde(default, with = "decimal_number")]
    pub discount: Decimal,
    #[n(10)]
    #[serde(default)]
    pub created_at: TimeStamp,
    #[n(11)]
    #[serde(default)]
    pub updated_at: TimeStamp,
    #[n(12)]
    pub expires_at: Option<TimeStamp>,
    #[n(13)]
    pub date_of_signature: Option<TimeStamp>,
}

/// What a caller supplies to create a document. Identity, passcode and
/// timestamps are assigned by the store.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewDocument {
    #[serde(default)]
    pub company: Company,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub note: String,
    #[serde(default, with = "decimal_number")]
    pub discount: Decimal,
}

impl NewDocument {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            ..Default::default()
        }
    }
    pub fn set_company(mut self, company: Company) -> Self {
        self.company = company;
        self
    }
    pub fn set_note(mut self, note: &str) -> Self {
        self.note = note.to_owned();
        self
    }
    pub fn set_discount(mut self, discount: Decimal) -> Self {
        self.discount = discount;
        self
    }
}

impl Document {
    pub fn to_value(&self) -> Result<Value, DocumentError> {
        serde_json::to_value(self).map_err(|err| DocumentError::InvalidField(err.to_string()))
    }

    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        serde_json::from_value(value).map_err(|err| DocumentError::InvalidField(err.to_string()))
    }

    /// The editable surface as JSON, in a fixed field order. This is what the
    /// change log compares.
    pub fn tracked_view(&self) -> Value {
        let timestamp = |ts: Option<TimeStamp>| {
            ts.and_then(|ts| serde_json::to_value(ts).ok())
                .unwrap_or(Value::Null)
        };

        let mut view = Map::new();
        view.insert("data".into(), self.data.clone());
        view.insert("note".into(), Value::String(self.note.clone()));
        view.insert("discount".into(), pricing::decimal_to_value(self.discount));
        view.insert("expiresAt".into(), timestamp(self.expires_at));
        view.insert("dateOfSignature".into(), timestamp(self.date_of_signature));
        Value::Object(view)
    }

    pub fn selected_client(&self) -> Option<ClientRef> {
        self.data
            .get("selectedClient")
            .filter(|client| !client.is_null())
            .and_then(|client| serde_json::from_value(client.clone()).ok())
    }

    pub fn products(&self) -> Result<Vec<Product>, DocumentError> {
        match self.data.get("addedProducts") {
            None | Some(Value::Null) => Ok(vec![]),
            Some(products) => serde_json::from_value(products.clone())
                .map_err(|err| DocumentError::InvalidField(format!("addedProducts: {err}"))),
        }
    }

    pub fn totals(&self) -> Result<Totals, DocumentError> {
        Ok(pricing::document_totals(&self.products()?, self.discount))
    }

    pub fn revision(&self, id: u32) -> Option<&Revision> {
        self.revisions.iter().find(|revision| revision.id() == id)
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at.is_past())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Document {
        Document::from_value(json!({
            "hash": "doc_1abc",
            "id": 4,
            "company": "rental",
            "otp": "123456",
            "status": {"CLIENT_VIEWED": true},
            "data": {
                "selectedClient": {"id": 3, "name": "Acme"},
                "paymentTerms": "30 days",
                "addedProducts": [{"id": 1, "name": "Pump", "price": 1000, "discount": 0}]
            },
            "note": "call first",
            "discount": 2.5
        }))
        .unwrap()
    }

    #[test]
    fn reads_camel_case_json() {
        let doc = sample();
        assert_eq!(doc.company, Company::Rental);
        assert!(doc.status.client_viewed);
        assert!(!doc.status.rejected);
        assert_eq!(doc.discount.to_string(), "2.5");
        assert!(doc.revisions.is_empty());
    }

    #[test]
    fn json_round_trip_is_lossless() {
        let doc = sample();
        let again = Document::from_value(doc.to_value().unwrap()).unwrap();
        assert_eq!(doc, again);
    }

    #[test]
    fn cbor_round_trip_is_lossless() {
        let doc = sample();
        let encoded = minicbor::to_vec(&doc).unwrap();
        let decoded: Document = minicbor::decode(&encoded).unwrap();
        assert_eq!(doc, decoded);
    }

    #[test]
    fn tracked_view_only_holds_editable_fields() {
        let view = sample().tracked_view();
        let keys: Vec<_> = view.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, EDITABLE_FIELDS.to_vec());
    }

    #[test]
    fn selected_client_is_read_from_payload() {
        let client = sample().selected_client().unwrap();
        assert_eq!(client.id, 3);

        let mut doc = sample();
        doc.data["selectedClient"] = Value::Null;
        assert!(doc.selected_client().is_none());
    }
}
