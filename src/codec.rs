//! CBOR codecs for the field types minicbor has no impls for.
//!
//! Used through `#[cbor(with = "...")]` on the persisted structs.

/// `serde_json::Value` as native CBOR: maps keep their key order, numbers keep
/// their integer/float distinction.
pub mod json {
    use minicbor::data::Type;
    use minicbor::{Decoder, Encoder};
    use serde_json::{Map, Number, Value};

    pub fn encode<Ctx, W: minicbor::encode::Write>(
        v: &Value,
        e: &mut Encoder<W>,
        ctx: &mut Ctx,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match v {
            Value::Null => {
                e.null()?;
            }
            Value::Bool(b) => {
                e.bool(*b)?;
            }
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    e.u64(u)?;
                } else if let Some(i) = n.as_i64() {
                    e.i64(i)?;
                } else if let Some(f) = n.as_f64() {
                    e.f64(f)?;
                } else {
                    return Err(minicbor::encode::Error::message("unrepresentable number"));
                }
            }
            Value::String(s) => {
                e.str(s)?;
            }
            Value::Array(items) => {
                e.array(items.len() as u64)?;
                for item in items {
                    encode(item, e, ctx)?;
                }
            }
            Value::Object(map) => {
                e.map(map.len() as u64)?;
                for (key, item) in map {
                    e.str(key)?;
                    encode(item, e, ctx)?;
                }
            }
        }
        Ok(())
    }

    pub fn decode<'b, Ctx>(
        d: &mut Decoder<'b>,
        ctx: &mut Ctx,
    ) -> Result<Value, minicbor::decode::Error> {
        match d.datatype()? {
            Type::Null | Type::Undefined => {
                d.skip()?;
                Ok(Value::Null)
            }
            Type::Bool => Ok(Value::Bool(d.bool()?)),
            Type::U8 | Type::U16 | Type::U32 | Type::U64 => Ok(Value::from(d.u64()?)),
            Type::I8 | Type::I16 | Type::I32 | Type::I64 => Ok(Value::from(d.i64()?)),
            Type::F16 | Type::F32 | Type::F64 => Number::from_f64(d.f64()?)
                .map(Value::Number)
                .ok_or_else(|| {
                    minicbor::decode::Error::message("non-finite float in document")
                }),
            Type::String => Ok(Value::String(d.str()?.to_owned())),
            Type::Array => {
                let len = d
                    .array()?
                    .ok_or_else(|| minicbor::decode::Error::message("indefinite array"))?;
                let mut items = Vec::with_capacity(len as usize);
                for _ in 0..len {
                    items.push(decode(d, ctx)?);
                }
                Ok(Value::Array(items))
            }
            Type::Map => {
                let len = d
                    .map()?
                    .ok_or_else(|| minicbor::decode::Error::message("indefinite map"))?;
                let mut map = Map::new();
                for _ in 0..len {
                    let key = d.str()?.to_owned();
                    map.insert(key, decode(d, ctx)?);
                }
                Ok(Value::Object(map))
            }
            other => Err(minicbor::decode::Error::type_mismatch(other)),
        }
    }
}

/// Decimals travel as their canonical string form so no precision is lost.
pub mod decimal {
    use minicbor::{Decoder, Encoder};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    pub fn encode<Ctx, W: minicbor::encode::Write>(
        v: &Decimal,
        e: &mut Encoder<W>,
        _: &mut Ctx,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.str(&v.to_string())?.ok()
    }

    pub fn decode<'b, Ctx>(
        d: &mut Decoder<'b>,
        _: &mut Ctx,
    ) -> Result<Decimal, minicbor::decode::Error> {
        let raw = d.str()?;
        Decimal::from_str(raw).map_err(|err| minicbor::decode::Error::message(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    #[derive(minicbor::Encode, minicbor::Decode, Debug, PartialEq)]
    struct Wrapper {
        #[cbor(n(0), with = "super::json")]
        value: Value,
    }

    #[test]
    fn nested_payload_survives_cbor() {
        let value = json!({
            "selectedClient": null,
            "paymentTerms": "30 days",
            "addedProducts": [
                {"id": 1, "name": "Pump", "price": 1000.5, "discount": 0, "components": []}
            ],
            "flag": true,
            "offset": -12
        });
        let encoded = minicbor::to_vec(&Wrapper {
            value: value.clone(),
        })
        .unwrap();
        let decoded: Wrapper = minicbor::decode(&encoded).unwrap();

        assert_eq!(decoded.value, value);
    }

    #[derive(minicbor::Encode, minicbor::Decode, Debug, PartialEq)]
    struct Amount {
        #[cbor(n(0), with = "super::decimal")]
        value: rust_decimal::Decimal,
    }

    #[test]
    fn decimal_keeps_its_scale() {
        let value = rust_decimal::Decimal::new(99950, 3);
        let encoded = minicbor::to_vec(&Amount { value }).unwrap();
        let decoded: Amount = minicbor::decode(&encoded).unwrap();

        assert_eq!(decoded.value.to_string(), "99.950");
    }

    #[test]
    fn key_order_is_preserved() {
        let value = json!({"zeta": 1, "alpha": 2, "mid": 3});
        let encoded = minicbor::to_vec(&Wrapper { value }).unwrap();
        let decoded: Wrapper = minicbor::decode(&encoded).unwrap();

        let keys: Vec<_> = decoded.value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }
}
