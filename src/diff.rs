//! Deep structural diff between two document snapshots.
//!
//! The walk is depth first. Maps recurse over the union of their keys (left
//! keys in order, then right-only keys), lists recurse index by index up to the
//! longer length, and everything else is compared as a leaf. Lists are never
//! matched by content, so moving an element shows up at both indices.
use crate::label::LabelResolver;
use crate::path::{Path, Segment};
use crate::types::TimeStamp;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Properties where a missing value, `null`, `false`, `""` and `0` all mean zero.
const ZERO_NORMALISED: [&str; 3] = ["price", "discount", "discountedPrice"];

const FROM_MARKER: &str = "__from__";
const TO_MARKER: &str = "__to__";

#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, minicbor::Encode, minicbor::Decode,
)]
#[serde(rename_all = "camelCase")]
pub struct ChangeLogItem {
    #[n(0)]
    #[serde(rename = "property")]
    pub path: Path,
    #[cbor(n(1), with = "crate::codec::json")]
    pub original_value: Value,
    #[cbor(n(2), with = "crate::codec::json")]
    pub new_value: Value,
    #[n(3)]
    pub timestamp: TimeStamp,
    #[n(4)]
    pub action: String,
    #[n(5)]
    pub details: String,
}

impl ChangeLogItem {
    /// The display form of the changed path, e.g. `data.addedProducts[0].discount`.
    pub fn property(&self) -> String {
        self.path.to_string()
    }
    pub fn parsed_details(&self) -> Option<ChangeDetails> {
        ChangeDetails::parse(&self.details)
    }
}

/// The from/to payload carried in [`ChangeLogItem::details`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeDetails {
    pub from: Value,
    pub to: Value,
}

impl ChangeDetails {
    pub fn encode(from: &Value, to: &Value) -> String {
        format!("{FROM_MARKER}{from}{TO_MARKER}{to}")
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let body = raw.strip_prefix(FROM_MARKER)?;
        // a string value may itself contain the marker, take the first split
        // where both halves are valid JSON
        body.match_indices(TO_MARKER).find_map(|(at, _)| {
            let from = serde_json::from_str(&body[..at]).ok()?;
            let to = serde_json::from_str(&body[at + TO_MARKER.len()..]).ok()?;
            Some(Self { from, to })
        })
    }
}

pub fn compute_diff(original: &Value, working: &Value) -> Vec<ChangeLogItem> {
    compute_diff_at(original, working, TimeStamp::new())
}

/// Same as [`compute_diff`] with every item stamped `at`.
pub fn compute_diff_at(original: &Value, working: &Value, at: TimeStamp) -> Vec<ChangeLogItem> {
    let mut walker = DiffWalker {
        resolver: LabelResolver::new(original, working),
        at,
        changes: vec![],
    };
    walker.visit(&Path::root(), Some(original), Some(working));
    walker.changes
}

struct DiffWalker<'a> {
    resolver: LabelResolver<'a>,
    at: TimeStamp,
    changes: Vec<ChangeLogItem>,
}

impl<'a> DiffWalker<'a> {
    fn visit(&mut self, path: &Path, left: Option<&'a Value>, right: Option<&'a Value>) {
        match (left, right) {
            (Some(Value::Object(a)), Some(Value::Object(b))) => {
                let keys = a.keys().chain(b.keys().filter(|key| !a.contains_key(*key)));
                for key in keys {
                    self.visit(&path.child(key.as_str()), a.get(key), b.get(key));
                }
            }
            (Some(Value::Array(a)), Some(Value::Array(b))) => {
                for index in 0..a.len().max(b.len()) {
                    self.visit(&path.child(index), a.get(index), b.get(index));
                }
            }
            _ => self.compare_leaf(path, left, right),
        }
    }

    fn compare_leaf(&mut self, path: &Path, left: Option<&Value>, right: Option<&Value>) {
        let normalise = path
            .segments()
            .last()
            .and_then(Segment::as_key)
            .is_some_and(|key| ZERO_NORMALISED.contains(&key));

        let (from, to, equal) = if normalise {
            let from = falsy_to_zero(left);
            let to = falsy_to_zero(right);
            let equal = values_equal(&from, &to);
            (from, to, equal)
        } else {
            let equal = match (left, right) {
                (None, None) => true,
                (Some(a), Some(b)) => values_equal(a, b),
                _ => false,
            };
            (
                left.cloned().unwrap_or(Value::Null),
                right.cloned().unwrap_or(Value::Null),
                equal,
            )
        };

        if equal {
            return;
        }

        self.changes.push(ChangeLogItem {
            path: path.clone(),
            details: ChangeDetails::encode(&from, &to),
            action: self.resolver.resolve(path),
            original_value: from,
            new_value: to,
            timestamp: self.at,
        });
    }
}

fn falsy_to_zero(value: Option<&Value>) -> Value {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Value::from(0),
        Some(Value::String(s)) if s.is_empty() => Value::from(0),
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => Value::from(0),
        Some(other) => other.clone(),
    }
}

/// Structural equality where numbers compare by value, so `1` equals `1.0`.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(key, l)| y.get(key).is_some_and(|r| values_equal(l, r)))
        }
        _ => a == b,
    }
}

fn numbers_equal(x: &Number, y: &Number) -> bool {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a == b;
    }
    x.as_f64() == y.as_f64()
}
