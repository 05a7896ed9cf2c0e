//! hook-process: ciclo de vida de procesos hijos (handlers de hooks).
//!
//! Envuelve un proceso lanzado con `tokio::process` y le agrega:
//! - terminación cooperativa (`signal_term`) y forzada (`signal_kill`),
//! - un bucle `terminate` con reintentos y escalado opcional a kill,
//! - detección de crash: al salir, si nadie pidió la terminación, el
//!   `ExitReport` produce un `CrashReport` estructurado.
pub mod errors;
pub mod exit;
pub mod handle;
mod signal;
pub mod terminate;

pub use errors::ProcessError;
pub use exit::{CrashReport, ExitReport};
pub use handle::{spawn, ManagedProcess, ProcessSpec};
pub use terminate::TerminateOptions;
