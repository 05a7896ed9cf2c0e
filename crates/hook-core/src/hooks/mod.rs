//! Hooks: fases, callbacks, contexto de ejecución y registro.
pub mod context;
pub mod hook;
pub mod phase;
pub mod registry;

pub use context::{HookContext, HookLogEntry};
pub use hook::{FnHook, Hook, HookCallback, HookTarget};
pub use phase::HookPhase;
pub use registry::HookRegistry;
