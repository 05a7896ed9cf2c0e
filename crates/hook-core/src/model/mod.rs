//! Modelo de datos de transacciones.
pub mod raw;
mod serde_util;
pub mod transaction;

pub use raw::{Header, RawRequest, RawResponse, RawTransaction};
pub use test::{Severity, TestReport, TestStatus, TransactionError};
pub use transaction::{ExpectedResponse, FailReason, RealResponse, Request, Transaction};
