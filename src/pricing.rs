//! Product and component snapshots embedded in a quote, and their totals.
//!
//! Amounts are decimal. A missing, `null`, `false` or empty value reads as
//! zero, the same rule the change log uses. Other non-numeric input is refused.
use crate::types::Company;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Read an amount. `null`, `false` and blank strings are zero; any other
/// value has to be a number or a numeric string.
pub fn parse_decimal(value: &Value) -> Result<Decimal, String> {
    match value {
        Value::Null | Value::Bool(false) => Ok(Decimal::ZERO),
        Value::String(s) if s.trim().is_empty() => Ok(Decimal::ZERO),
        Value::Number(n) => {
            let raw = n.to_string();
            Decimal::from_str(&raw)
                .or_else(|_| Decimal::from_scientific(&raw))
                .map_err(|_| format!("{raw} is out of range for an amount"))
        }
        Value::String(s) => {
            Decimal::from_str(s.trim()).map_err(|_| format!("`{s}` is not a number"))
        }
        other => Err(format!("expected a number, found {other}")),
    }
}

/// Lenient form of [`parse_decimal`], anything unreadable counts as zero.
pub fn to_decimal(value: &Value) -> Decimal {
    parse_decimal(value).unwrap_or_default()
}

/// Integral amounts become JSON integers, everything else a float.
pub fn decimal_to_value(amount: Decimal) -> Value {
    let normalized = amount.normalize();
    if normalized.scale() == 0 {
        if let Some(whole) = normalized.to_i64() {
            return Value::from(whole);
        }
    }
    normalized
        .to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::from(0))
}

/// serde adapter writing a `Decimal` as a JSON number.
pub mod decimal_number {
    use super::{decimal_to_value, parse_decimal};
    use rust_decimal::Decimal;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(v: &Decimal, s: S) -> Result<S::Ok, S::Error> {
        decimal_to_value(*v).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Decimal, D::Error> {
        let value = Value::deserialize(d)?;
        parse_decimal(&value).map_err(D::Error::custom)
    }
}

fn quantity_at_least_one<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let value = Value::deserialize(d)?;
    let quantity = to_decimal(&value).trunc().to_u32().unwrap_or(1);
    Ok(quantity.max(1))
}

fn one() -> u32 {
    1
}

fn included_by_default() -> bool {
    true
}

fn round(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Multiplier left after a percentage discount, clamped to 0..=100.
fn discount_factor(discount: Decimal) -> Decimal {
    let discount = discount.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
    (Decimal::ONE_HUNDRED - discount) / Decimal::ONE_HUNDRED
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, with = "decimal_number")]
    pub price: Decimal,
    #[serde(default = "one", deserialize_with = "quantity_at_least_one")]
    pub quantity: u32,
    #[serde(default, with = "decimal_number")]
    pub discount: Decimal,
    #[serde(default = "included_by_default")]
    pub included: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_index: Option<usize>,
}

impl Component {
    pub fn line_total(&self) -> Decimal {
        if !self.included {
            return Decimal::ZERO;
        }
        round(self.price * Decimal::from(self.quantity.max(1)) * discount_factor(self.discount))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, with = "decimal_number")]
    pub price: Decimal,
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<Company>,
    #[serde(default, with = "decimal_number")]
    pub discount: Decimal,
    #[serde(default)]
    pub img_url: String,
    #[serde(default)]
    pub components: Vec<Component>,
}

impl Product {
    pub fn components_total(&self) -> Decimal {
        self.components.iter().map(Component::line_total).sum()
    }

    pub fn total(&self) -> Decimal {
        round((self.price + self.components_total()) * discount_factor(self.discount))
    }

    /// The copy that goes into a document. Components without a catalog
    /// position get their current one so later reordering stays traceable.
    pub fn snapshot(&self) -> Product {
        let mut copy = self.clone();
        for (position, component) in copy.components.iter_mut().enumerate() {
            component.original_index.get_or_insert(position);
        }
        copy
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

/// Sum the products, then apply the document-level discount.
pub fn document_totals(products: &[Product], document_discount: Decimal) -> Totals {
    let subtotal: Decimal = products.iter().map(Product::total).sum();
    let total = round(subtotal * discount_factor(document_discount));

    Totals {
        subtotal,
        discount: subtotal - total,
        total,
    }
}
