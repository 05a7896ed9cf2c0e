//! HookFlow Rust Library
//!
//! Fachada del workspace: re-exporta los crates miembro y un `prelude` con
//! lo necesario para armar una corrida.
//! - `hook_process`: procesos hijos con terminación ordenada y detección de
//!   caídas.
//! - `hook_sandbox`: evaluación aislada de hooks escritos como funciones JS.
//! - `hook_core`: transacciones, registro de hooks, eventos y configuración.
//! - `hook_worker`: hooks en otros lenguajes vía un handler externo por TCP.
//! - `hook_runner`: el pipeline de fases y veredictos.

pub use hook_core;
pub use hook_process;
pub use hook_runner;
pub use hook_sandbox;
pub use hook_worker;

pub mod prelude {
    pub use hook_core::{FailReason, Hook, HookContext, HookError, HookPhase, HookRegistry, HookTarget, HttpClient,
                        InMemoryReporter, RawTransaction, Reporter, RunConfig, RunEvent, RunEventKind, RunStats,
                        TestStatus, Transaction, ValidationResult, Validator, WorkerConfig};
    pub use hook_runner::{RunError, TransactionRunner};
}
