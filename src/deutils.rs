// src/deutils.rs
//! serde helpers for providers that send numbers as strings (or both).
use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn numeric(v: &Value) -> Option<f64> {
    v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

/// `67000.5` or `"67000.5"` -> 67000.5
pub fn deserialize_numeric_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let v = Value::deserialize(deserializer)?;
    numeric(&v).ok_or_else(|| D::Error::custom(format!("expected a number, got {}", v)))
}

/// Optional variant; absent, null, or unparseable all read as `None`.
pub fn deserialize_opt_numeric_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(v.as_ref().and_then(numeric))
}

/// Strings pass through, numbers are rendered; `"1.25"` and `1.25` both give "1.25".
pub fn deserialize_string_from_anything<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    Ok(match v {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}
