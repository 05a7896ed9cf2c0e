//! Latch pegajoso de fallo del handler de hooks.
//!
//! Una vez disparado no se puede limpiar; el runner lo consulta en cada
//! frontera de fase y aborta el resto de la corrida.
use std::sync::Arc;

use log::error;
use once_cell::sync::OnceCell;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerFailure {
    pub message: String,
}

impl HandlerFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunLatch {
    failure: Arc<OnceCell<HandlerFailure>>,
}

impl RunLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispara el latch. Sólo el primer fallo queda registrado; devuelve
    /// `true` si fue éste.
    pub fn trip(&self, failure: HandlerFailure) -> bool {
        let message = failure.message.clone();
        let first = self.failure.set(failure).is_ok();
        if first {
            error!("hook handler error: {message}");
        }
        first
    }

    pub fn is_tripped(&self) -> bool {
        self.failure.get().is_some()
    }

    pub fn failure(&self) -> Option<&HandlerFailure> {
        self.failure.get()
    }

    pub fn check(&self) -> Result<(), HandlerFailure> {
        match self.failure.get() {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }
}
