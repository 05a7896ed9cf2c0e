//! `Transaction`: un caso de prueba ejecutable.
//!
//! Se serializa con las claves camelCase que ven los hooks (sandbox y
//! workers). Las claves desconocidas que agregue un hook se conservan en
//! `extra` y viajan de vuelta en la siguiente llamada.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::serde_util::{string_or_number, truthy};
use super::test::{TestReport, TransactionError};
use crate::errors::CoreError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedResponse {
    #[serde(default, deserialize_with = "string_or_number")]
    pub status_code: String,
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_schema: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealResponse {
    pub status_code: u16,
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    #[serde(default)]
    pub body: String,
}

impl RealResponse {
    pub fn new(status_code: u16) -> Self {
        Self { status_code, ..Self::default() }
    }
}

/// Valor de `transaction.fail`: los hooks escriben `true` o un motivo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FailReason {
    Flag(bool),
    Message(String),
    Other(Value),
}

impl FailReason {
    pub fn is_set(&self) -> bool {
        match self {
            FailReason::Flag(flag) => *flag,
            FailReason::Message(message) => !message.is_empty(),
            FailReason::Other(value) => !value.is_null(),
        }
    }

    /// Texto del motivo tal como se concatena en los mensajes de veredicto.
    pub fn reason(&self) -> String {
        match self {
            FailReason::Flag(flag) => flag.to_string(),
            FailReason::Message(message) => message.clone(),
            FailReason::Other(value) => value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default)]
    pub full_path: String,
    #[serde(default)]
    pub request: Request,
    #[serde(default)]
    pub expected: ExpectedResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real: Option<RealResponse>,
    #[serde(default)]
    pub origin: Value,
    #[serde(default, deserialize_with = "truthy")]
    pub skip: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail: Option<FailReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<TestReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<TransactionError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Transaction {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    pub fn is_failed(&self) -> bool {
        self.fail.as_ref().is_some_and(FailReason::is_set)
    }

    pub fn fail_reason(&self) -> Option<String> {
        self.fail.as_ref().filter(|f| f.is_set()).map(FailReason::reason)
    }

    /// URL absoluta a la que apunta la petición.
    pub fn url(&self) -> String {
        let protocol = self.protocol.as_deref().unwrap_or("http:");
        let host = self.host.as_deref().unwrap_or("localhost");
        match self.port {
            Some(port) => format!("{protocol}//{host}:{port}{}", self.full_path),
            None => format!("{protocol}//{host}{}", self.full_path),
        }
    }

    pub fn to_value(&self) -> Result<Value, CoreError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Copia las claves de `patch` sobre esta transacción, sin reemplazarla.
    ///
    /// Claves ausentes en `patch` quedan como estaban. Si el resultado no es
    /// una transacción válida, `self` no se modifica.
    pub fn merge_patch(&mut self, patch: &Map<String, Value>) -> Result<(), CoreError> {
        let mut current = self.to_value()?;
        if let Value::Object(fields) = &mut current {
            for (key, value) in patch {
                fields.insert(key.clone(), value.clone());
            }
        }
        let merged: Transaction = serde_json::from_value(current).map_err(|e| CoreError::InvalidTransaction(e.to_string()))?;
        *self = merged;
        Ok(())
    }

    /// Igual que `merge_patch` pero aceptando cualquier `Value`; lo que no sea
    /// objeto se rechaza.
    pub fn merge_value(&mut self, value: &Value) -> Result<(), CoreError> {
        match value {
            Value::Object(patch) => self.merge_patch(patch),
            other => Err(CoreError::InvalidTransaction(format!("expected an object, got {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_with_camel_case_keys() {
        let mut t = Transaction::named("Machines > Get");
        t.full_path = "/machines".into();
        t.expected.status_code = "200".into();
        let value = t.to_value().unwrap();
        assert_eq!(value["fullPath"], "/machines");
        assert_eq!(value["expected"]["statusCode"], "200");
        assert!(value.get("fail").is_none());
    }

    #[test]
    fn merge_keeps_identity_fields_and_unknown_keys() {
        let mut t = Transaction::named("T");
        t.request.method = "GET".into();
        t.merge_value(&json!({ "skip": true, "hooks_modifications": ["before"] })).unwrap();
        assert!(t.skip);
        assert_eq!(t.request.method, "GET");
        assert_eq!(t.extra["hooks_modifications"], json!(["before"]));
    }

    #[test]
    fn invalid_patch_leaves_transaction_untouched() {
        let mut t = Transaction::named("T");
        let err = t.merge_value(&json!({ "port": "not a port" })).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransaction(_)));
        assert_eq!(t, Transaction::named("T"));
    }

    #[test]
    fn fail_accepts_flag_or_message() {
        let mut t = Transaction::named("T");
        t.merge_value(&json!({ "fail": "Yay! Failed!" })).unwrap();
        assert_eq!(t.fail_reason().as_deref(), Some("Yay! Failed!"));
        t.merge_value(&json!({ "fail": false })).unwrap();
        assert!(!t.is_failed());
        t.merge_value(&json!({ "fail": true })).unwrap();
        assert_eq!(t.fail_reason().as_deref(), Some("true"));
    }

    #[test]
    fn skip_uses_js_truthiness() {
        let mut t = Transaction::named("T");
        t.merge_value(&json!({ "skip": 1 })).unwrap();
        assert!(t.skip);
        t.merge_value(&json!({ "skip": null })).unwrap();
        assert!(!t.skip);
    }

    #[test]
    fn url_joins_protocol_host_port_and_path() {
        let mut t = Transaction::named("T");
        t.protocol = Some("http:".into());
        t.host = Some("127.0.0.1".into());
        t.port = Some(3000);
        t.full_path = "/api/items".into();
        assert_eq!(t.url(), "http://127.0.0.1:3000/api/items");
    }
}
