//! Eventos que el pipeline emite hacia los reporters.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{TestReport, TestStatus};
use crate::stats::RunStats;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunEventKind {
    Start,
    TestStart(TestReport),
    TestPass(TestReport),
    TestFail(TestReport),
    TestSkip(TestReport),
    /// Error de hook o de intercambio HTTP; no es un fallo de la prueba.
    TestError { error: String, test: TestReport },
    End { stats: RunStats },
}

impl RunEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            RunEventKind::Start => "start",
            RunEventKind::TestStart(_) => "test start",
            RunEventKind::TestPass(_) => "test pass",
            RunEventKind::TestFail(_) => "test fail",
            RunEventKind::TestSkip(_) => "test skip",
            RunEventKind::TestError { .. } => "test error",
            RunEventKind::End { .. } => "end",
        }
    }

    pub fn test(&self) -> Option<&TestReport> {
        match self {
            RunEventKind::TestStart(test)
            | RunEventKind::TestPass(test)
            | RunEventKind::TestFail(test)
            | RunEventKind::TestSkip(test)
            | RunEventKind::TestError { test, .. } => Some(test),
            RunEventKind::Start | RunEventKind::End { .. } => None,
        }
    }

    /// Estado del veredicto si el evento es uno (`test start` no lo es).
    pub fn verdict(&self) -> Option<TestStatus> {
        match self {
            RunEventKind::TestPass(_) => Some(TestStatus::Pass),
            RunEventKind::TestFail(_) => Some(TestStatus::Fail),
            RunEventKind::TestSkip(_) => Some(TestStatus::Skip),
            RunEventKind::TestError { .. } => Some(TestStatus::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    pub seq: u64, // asignado por ReporterHub (orden de emisión)
    pub kind: RunEventKind,
    pub ts: DateTime<Utc>,
}
