use serde::{Deserialize, Serialize};

use crate::model::TestStatus;

/// Conteo agregado de veredictos de una corrida.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub tests: usize,
    pub passes: usize,
    pub failures: usize,
    pub errors: usize,
    pub skipped: usize,
}

impl RunStats {
    pub fn record(&mut self, status: TestStatus) {
        self.tests += 1;
        match status {
            TestStatus::Pass => self.passes += 1,
            TestStatus::Fail => self.failures += 1,
            TestStatus::Skip => self.skipped += 1,
            TestStatus::Error => self.errors += 1,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures == 0 && self.errors == 0
    }
}
