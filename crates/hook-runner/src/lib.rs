//! hook-runner: pipeline de ejecución de transacciones con hooks.
//!
//! `TransactionRunner::run` configura las transacciones crudas, carga los
//! hooks (sandbox o worker externo) y recorre las fases en orden fijo:
//! `beforeAll`, por cada transacción `beforeEach`, `before`, intercambio
//! HTTP, `beforeEachValidation`, `beforeValidation`, validación,
//! `afterEach`, `after` y veredicto, y al final `afterAll`.
pub mod configure;
pub mod errors;
pub mod loader;
pub mod runner;
pub mod sort;

pub use configure::{configure_transaction, configure_transactions};
pub use errors::RunError;
pub use loader::{load_hooks, resolve_hookfiles};
pub use runner::TransactionRunner;
pub use sort::sort_transactions;
