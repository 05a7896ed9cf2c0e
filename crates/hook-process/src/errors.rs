use std::io;

use thiserror::Error;

/// Errores del ciclo de vida de un proceso hijo.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to send {signal} to process {pid}: {source}")]
    Signal {
        pid: u32,
        signal: &'static str,
        #[source]
        source: io::Error,
    },
    /// Timeout de `terminate` sin `force`. No se escala automáticamente.
    #[error("Unable to gracefully terminate process {pid}")]
    UnableToTerminate { pid: u32 },
    #[error("stdin of process {pid} is closed")]
    StdinClosed { pid: u32 },
}
