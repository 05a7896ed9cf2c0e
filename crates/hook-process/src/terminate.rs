//! Bucle de terminación cooperativa con reintentos.
use std::time::Duration;

use log::{debug, warn};
use tokio::time::{timeout, Instant};

use crate::errors::ProcessError;
use crate::handle::ManagedProcess;

/// Primera verificación casi inmediata tras la primera señal.
const TERM_FIRST_CHECK: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminateOptions {
    pub timeout: Duration,
    pub retry_delay: Duration,
    /// Escalar a `signal_kill` si vence `timeout`.
    pub force: bool,
}

impl Default for TerminateOptions {
    fn default() -> Self {
        Self { timeout: Duration::from_millis(1000),
               retry_delay: Duration::from_millis(300),
               force: false }
    }
}

impl ManagedProcess {
    /// Envía la señal cooperativa y la repite cada `retry_delay` hasta que el
    /// proceso salga o venza `timeout`. Cualquier fallo al señalizar corta el
    /// bucle con ese error.
    pub async fn terminate(&self, options: TerminateOptions) -> Result<(), ProcessError> {
        debug!("terminate:start pid={} timeout_ms={} retry_ms={} force={}",
               self.pid(),
               options.timeout.as_millis(),
               options.retry_delay.as_millis(),
               options.force);
        if self.has_terminated() {
            return Ok(());
        }
        let started = Instant::now();
        self.signal_term().await?;

        let mut delay = TERM_FIRST_CHECK;
        loop {
            // despierta antes si el proceso sale durante la espera
            let _ = timeout(delay, self.wait()).await;
            if self.has_terminated() {
                debug!("terminate:done pid={} attempts={}", self.pid(), self.term_attempts());
                return Ok(());
            }
            if started.elapsed() >= options.timeout {
                break;
            }
            self.signal_term().await?;
            delay = options.retry_delay;
        }

        if options.force {
            warn!("process {} ignored {} termination requests, killing it", self.pid(), self.term_attempts());
            return self.signal_kill().await;
        }
        Err(ProcessError::UnableToTerminate { pid: self.pid() })
    }
}
