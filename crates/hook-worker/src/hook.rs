use std::sync::Arc;

use async_trait::async_trait;
use hook_core::{FailReason, HookCallback, HookContext, HookError, HookPhase, HookTarget};
use log::debug;
use serde_json::Value;

use crate::connection::{CallOutcome, WorkerConnection};

pub const TIMED_OUT_MESSAGE: &str = "Hook timed out.";

/// Hook registrado en nombre del handler externo: reenvía la fase por el
/// socket y fusiona la respuesta sobre el objetivo.
#[derive(Clone)]
pub struct WorkerHook {
    phase: HookPhase,
    connection: Arc<WorkerConnection>,
}

impl WorkerHook {
    pub fn new(phase: HookPhase, connection: Arc<WorkerConnection>) -> Self {
        Self { phase, connection }
    }

    pub fn phase(&self) -> HookPhase {
        self.phase
    }
}

#[async_trait]
impl HookCallback for WorkerHook {
    async fn call(&self, target: &mut HookTarget<'_>, _context: &mut HookContext) -> Result<(), HookError> {
        let data = target.to_value()?;
        let outcome = self.connection
                          .call(self.phase.as_str(), &data)
                          .await
                          .map_err(|e| HookError::Failed(e.to_string()))?;
        match outcome {
            CallOutcome::Reply(Value::Null) => {
                debug!("{}: empty reply from hooks handler", self.phase);
                Ok(())
            }
            CallOutcome::Reply(reply) => Ok(target.apply(&reply)?),
            CallOutcome::TimedOut => {
                if let Some(transaction) = target.transaction_mut() {
                    transaction.fail = Some(FailReason::Message(TIMED_OUT_MESSAGE.to_string()));
                }
                Ok(())
            }
        }
    }
}
