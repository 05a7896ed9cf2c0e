//! Contratos de los colaboradores externos: cliente HTTP y validador.
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::{ExchangeError, ValidationError};
use crate::model::{ExpectedResponse, RealResponse, Transaction};

/// Ejecuta la petición de la transacción contra el servidor bajo prueba.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn perform(&self, transaction: &Transaction) -> Result<RealResponse, ExchangeError>;
}

/// Compara respuesta real contra la esperada. Caja negra para el pipeline.
pub trait Validator: Send + Sync {
    fn validate(&self, expected: &ExpectedResponse, real: &RealResponse) -> Result<ValidationResult, ValidationError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationMessage {
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValidation {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<ValidationMessage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(default)]
    pub fields: IndexMap<String, FieldValidation>,
}

/// Campos que aportan líneas al mensaje del veredicto, en este orden.
const MESSAGE_FIELDS: [&str; 3] = ["headers", "body", "statusCode"];

impl ValidationResult {
    pub fn passed() -> Self {
        Self { valid: true, fields: IndexMap::new() }
    }

    /// Una línea `"<campo>: <mensaje>\n"` por error.
    pub fn message(&self) -> String {
        let mut message = String::new();
        for field in MESSAGE_FIELDS {
            if let Some(validation) = self.fields.get(field) {
                for error in &validation.errors {
                    message.push_str(&format!("{field}: {}\n", error.message));
                }
            }
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(messages: &[&str]) -> FieldValidation {
        FieldValidation { valid: messages.is_empty(),
                          errors: messages.iter().map(|m| ValidationMessage { message: m.to_string() }).collect() }
    }

    #[test]
    fn message_lists_headers_then_body_then_status() {
        let mut fields = IndexMap::new();
        fields.insert("statusCode".to_string(), field(&["expected 200, got 500"]));
        fields.insert("body".to_string(), field(&["missing key 'id'"]));
        fields.insert("headers".to_string(), field(&["missing Content-Type"]));
        fields.insert("method".to_string(), field(&["ignored"]));
        let result = ValidationResult { valid: false, fields };
        assert_eq!(result.message(),
                   "headers: missing Content-Type\nbody: missing key 'id'\nstatusCode: expected 200, got 500\n");
        assert_eq!(ValidationResult::passed().message(), "");
    }
}
