//! Serde adapter for currency amounts.
//!
//! Amounts travel as JSON numbers on the wire but are held as `BigDecimal`.
//! Decoding also accepts numeric strings, which is what Postgres `NUMERIC`
//! looks like in some JSON encoders.

use bigdecimal::{BigDecimal, ToPrimitive};
use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;
use std::str::FromStr;

pub fn serialize<S>(amount: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match amount.to_f64() {
        Some(value) if value.is_finite() => serializer.serialize_f64(value),
        _ => Err(S::Error::custom("amount is not representable as a JSON number")),
    }
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<BigDecimal, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    from_value(&raw).map_err(D::Error::custom)
}

fn from_value(raw: &Value) -> Result<BigDecimal, String> {
    match raw {
        Value::Number(n) => {
            BigDecimal::from_str(&n.to_string()).map_err(|e| format!("invalid amount: {}", e))
        }
        Value::String(s) => {
            BigDecimal::from_str(s.trim()).map_err(|e| format!("invalid amount: {}", e))
        }
        other => Err(format!("amount must be a number, got {}", other)),
    }
}

/// Same as the parent module for `Option<BigDecimal>`; `null` or a missing key decode to `None`.
pub mod option {
    use super::*;

    pub fn serialize<S>(amount: &Option<BigDecimal>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match amount {
            Some(value) => super::serialize(value, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<BigDecimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(None),
            raw => from_value(&raw).map(Some).map_err(D::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize, serde::Deserialize)]
    struct Wrapper {
        #[serde(with = "super")]
        amount: BigDecimal,
    }

    #[derive(serde::Deserialize)]
    struct OptionalWrapper {
        #[serde(default, with = "super::option")]
        amount: Option<BigDecimal>,
    }

    #[test]
    fn test_decodes_numbers_and_strings() {
        let from_number: Wrapper = serde_json::from_str(r#"{"amount": 50.25}"#).unwrap();
        let from_string: Wrapper = serde_json::from_str(r#"{"amount": "50.25"}"#).unwrap();
        assert_eq!(from_number.amount, from_string.amount);
    }

    #[test]
    fn test_rejects_non_numeric() {
        assert!(serde_json::from_str::<Wrapper>(r#"{"amount": "fifty"}"#).is_err());
        assert!(serde_json::from_str::<Wrapper>(r#"{"amount": true}"#).is_err());
    }

    #[test]
    fn test_encodes_as_number() {
        let json = serde_json::to_value(Wrapper {
            amount: "12.5".parse().unwrap(),
        })
        .unwrap();
        assert_eq!(json["amount"], 12.5);
    }

    #[test]
    fn test_optional_missing_and_null() {
        let missing: OptionalWrapper = serde_json::from_str("{}").unwrap();
        let null: OptionalWrapper = serde_json::from_str(r#"{"amount": null}"#).unwrap();
        assert!(missing.amount.is_none());
        assert!(null.amount.is_none());
    }
}
