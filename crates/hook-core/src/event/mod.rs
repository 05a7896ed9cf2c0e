pub mod reporter;
pub mod types;

pub use reporter::{InMemoryReporter, Reporter, ReporterHub};
pub use types::{RunEvent, RunEventKind};
