//! hook-sandbox: evaluación aislada de hooks escritos como texto JS.
//!
//! Cada llamada crea un runtime QuickJS nuevo, sin loader de módulos ni
//! bindings del host salvo `log`, `stash` y `assert`. Los datos entran y
//! salen como JSON, por lo que el llamador recibe copias y decide cómo
//! fusionarlas sobre sus objetos vivos.
pub mod collect;
pub mod errors;
pub mod evaluator;
mod prelude;

pub use collect::CollectedHooks;
pub use errors::SandboxError;
pub use evaluator::{SandboxEvaluator, SandboxLog, SandboxOutcome};
