use std::time::Duration;

use thiserror::Error;

/// Nombre del error que lanzan los helpers `assert*` del sandbox.
pub const ASSERTION_ERROR: &str = "AssertionError";

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("sandbox engine error: {0}")]
    Engine(String),
    /// Excepción JS no capturada por el hook.
    #[error("{name}: {message}")]
    Thrown { name: String, message: String },
    #[error("sandboxed hook timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("sandboxed hook produced invalid output: {0}")]
    Output(#[from] serde_json::Error),
}

impl SandboxError {
    pub fn is_assertion(&self) -> bool {
        matches!(self, SandboxError::Thrown { name, .. } if name == ASSERTION_ERROR)
    }

    /// Mensaje sin prefijo de tipo, tal como lo vería el autor del hook.
    pub fn message(&self) -> String {
        match self {
            SandboxError::Thrown { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assertion_is_detected_by_error_name() {
        let err = SandboxError::Thrown { name: ASSERTION_ERROR.into(), message: "expected 1 to equal 2".into() };
        assert!(err.is_assertion());
        assert_eq!(err.message(), "expected 1 to equal 2");
        let other = SandboxError::Thrown { name: "TypeError".into(), message: "x is undefined".into() };
        assert!(!other.is_assertion());
        assert_eq!(other.to_string(), "TypeError: x is undefined");
    }
}
