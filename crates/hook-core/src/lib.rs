//! hook-core: modelo de transacciones, registro de hooks y contratos.
//!
//! Este crate no ejecuta nada por sí mismo: define los tipos que comparten
//! el evaluador sandbox, el cliente de workers y el runner.
pub mod config;
pub mod errors;
pub mod event;
pub mod hooks;
pub mod latch;
pub mod model;
pub mod ports;
pub mod stats;

pub use config::{RunConfig, WorkerConfig};
pub use errors::{CoreError, ExchangeError, HookError, ReporterError, ValidationError};
pub use event::{InMemoryReporter, Reporter, ReporterHub, RunEvent, RunEventKind};
pub use hooks::{FnHook, Hook, HookCallback, HookContext, HookLogEntry, HookPhase, HookRegistry, HookTarget};
pub use latch::{HandlerFailure, RunLatch};
pub use model::{ExpectedResponse, FailReason, Header, RawRequest, RawResponse, RawTransaction, RealResponse, Request,
                Severity, TestReport, TestStatus, Transaction, TransactionError};
pub use ports::{FieldValidation, HttpClient, ValidationMessage, ValidationResult, Validator};
pub use stats::RunStats;
