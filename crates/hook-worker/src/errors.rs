use std::io;
use std::time::Duration;

use hook_process::ProcessError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// Comando no resoluble, lenguaje no soportado, Go ausente.
    #[error("{0}")]
    Setup(String),
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("Connection timeout {}s to hooks handler on {host}:{port} exceeded. Try increasing the limit.", .timeout.as_secs_f64())]
    ConnectTimeout { host: String, port: u16, timeout: Duration },
    /// El handler murió (latch disparado).
    #[error("{0}")]
    Handler(String),
    #[error("i/o error talking to hooks handler: {0}")]
    Io(#[from] io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("hooks handler connection closed")]
    ConnectionClosed,
}
