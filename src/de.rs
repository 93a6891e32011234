//! Lenient field coercion for vendor payloads.
//!
//! The Beijing Gas API is inconsistent about numeric fields: the same field
//! can arrive as `12.5` or `"12.5"`. Identifiers sometimes arrive as numbers.

use serde::{de::Error as _, Deserialize, Deserializer};
use serde_json::Value;

/// Coerces a JSON number or numeric string into `f64`.
pub fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Renders a scalar JSON value as a string; `null` and containers yield `None`.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn f64_lenient<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_to_f64(&value)
        .ok_or_else(|| D::Error::custom(format!("expected a number, got {}", value)))
}

pub fn opt_f64_lenient<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value_to_f64(&value)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("expected a number or null, got {}", value))),
    }
}

pub fn string_lenient<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_to_string(&value)
        .ok_or_else(|| D::Error::custom(format!("expected a string, got {}", value)))
}

pub fn opt_string_lenient<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_string))
}
