//! Transacciones tal como llegan del parser de descripciones (colaborador).
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::serde_util::string_or_number;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRequest {
    pub method: String,
    pub uri: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawResponse {
    #[serde(default, deserialize_with = "string_or_number")]
    pub status: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub schema: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    pub name: String,
    pub request: RawRequest,
    pub response: RawResponse,
    #[serde(default)]
    pub origin: Value,
    /// Media type de la descripción de API de origen.
    #[serde(default)]
    pub media_type: Option<String>,
}

impl RawTransaction {
    pub fn api_name(&self) -> Option<&str> {
        self.origin.get("apiName").and_then(Value::as_str)
    }
}
