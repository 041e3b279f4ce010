//! Lenient field deserializers for extracted records.
//!
//! Extractors emit codes as numbers or strings, amounts in Brazilian notation, and `null` for
//! anything they could not read. These helpers are used with `#[serde(deserialize_with)]` so a
//! single odd field degrades to its default instead of failing the whole payload.

use crate::money::parse_amount;
use rust_decimal::Decimal;
use serde::de::{self, Deserialize, Deserializer};
use serde_json::Value;

/// Text that may arrive as a string, a number, a boolean or `null` (empty).
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(de::Error::custom(format!(
            "expected a string or number, got {other}"
        ))),
    }
}

/// Monetary amount given as a number, plain or Brazilian text, or `null` (zero).
pub fn amount<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Decimal::ZERO),
        Value::String(s) => parse_amount(&s).map_err(de::Error::custom),
        Value::Number(n) => parse_amount(&n.to_string()).map_err(de::Error::custom),
        other => Err(de::Error::custom(format!("expected an amount, got {other}"))),
    }
}

/// Any defaultable field where `null` means the default.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Line {
        #[serde(deserialize_with = "string_or_number")]
        code: String,
        #[serde(deserialize_with = "amount")]
        value: Decimal,
        #[serde(deserialize_with = "null_as_default")]
        paid: bool,
    }

    #[test]
    fn numbers_become_text() {
        let line: Line = serde_json::from_str(r#"{"code": 30602246}"#).unwrap();
        assert_eq!(line.code, "30602246");
    }

    #[test]
    fn nulls_become_defaults() {
        let line: Line = serde_json::from_str(r#"{"code": null, "value": null, "paid": null}"#).unwrap();
        assert_eq!(line.code, "");
        assert_eq!(line.value, Decimal::ZERO);
        assert!(!line.paid);
    }

    #[test]
    fn amounts_accept_brazilian_text_and_numbers() {
        let line: Line = serde_json::from_str(r#"{"value": "R$ 3.200,50"}"#).unwrap();
        assert_eq!(line.value, Decimal::new(320050, 2));
        let line: Line = serde_json::from_str(r#"{"value": 3200.5}"#).unwrap();
        assert_eq!(line.value, Decimal::new(32005, 1));
    }

    #[test]
    fn unreadable_amount_is_an_error() {
        assert!(serde_json::from_str::<Line>(r#"{"value": "abc"}"#).is_err());
        assert!(serde_json::from_str::<Line>(r#"{"code": [1]}"#).is_err());
    }
}
