use hook_core::{CoreError, HandlerFailure};
use hook_worker::WorkerError;
use thiserror::Error;

/// Resultado fallido de una corrida completa.
#[derive(Debug, Error)]
pub enum RunError {
    /// Error de preparación: nada se ejecutó.
    #[error("{0}")]
    Setup(String),
    /// El handler de hooks falló; la corrida se abortó.
    #[error(transparent)]
    HandlerFailed(#[from] HandlerFailure),
    #[error(transparent)]
    Worker(WorkerError),
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<WorkerError> for RunError {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::Handler(message) => RunError::HandlerFailed(HandlerFailure::new(message)),
            other => RunError::Worker(other),
        }
    }
}

impl RunError {
    pub fn is_setup(&self) -> bool {
        matches!(self, RunError::Setup(_) | RunError::Worker(_) | RunError::Core(_))
    }
}
