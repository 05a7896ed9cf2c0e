//! Deserializadores tolerantes: los hooks escriben valores al estilo JS.
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Veracidad estilo JS: `null`, `false`, `0` y `""` son falsos.
pub(crate) fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where D: Deserializer<'de>
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

/// Acepta `"200"` o `200` y guarda siempre texto.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
    where D: Deserializer<'de>
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}
