//! Errores compartidos por el pipeline de hooks.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid transaction data: {0}")]
    InvalidTransaction(String),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config: {0}")]
    Config(String),
}

/// Resultado fallido de un hook.
///
/// `Assertion` falla las transacciones en alcance; el resto se reporta como
/// `test error` sin alterar el veredicto.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HookError {
    #[error("{0}")]
    Assertion(String),
    #[error("{0}")]
    Failed(String),
    #[error("sandbox: {0}")]
    Sandbox(String),
}

impl HookError {
    pub fn is_assertion(&self) -> bool {
        matches!(self, HookError::Assertion(_))
    }
}

impl From<CoreError> for HookError {
    fn from(err: CoreError) -> Self {
        HookError::Failed(err.to_string())
    }
}

/// Falla del cliente HTTP colaborador.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ExchangeError(pub String);

/// Falla del validador colaborador.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("reporter: {0}")]
pub struct ReporterError(pub String);
