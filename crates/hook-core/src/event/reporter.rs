//! Reporters: consumidores de eventos con backpressure.
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use log::warn;
use tokio::sync::Mutex;

use super::types::{RunEvent, RunEventKind};
use crate::errors::ReporterError;
use crate::model::TestStatus;

/// El pipeline espera a que `handle` termine antes de seguir.
#[async_trait]
pub trait Reporter: Send + Sync {
    async fn handle(&self, event: &RunEvent) -> Result<(), ReporterError>;
}

/// Reparte cada evento a todos los reporters, en orden, esperando a cada uno.
#[derive(Clone, Default)]
pub struct ReporterHub {
    reporters: Vec<Arc<dyn Reporter>>,
    seq: u64,
}

impl ReporterHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, reporter: Arc<dyn Reporter>) -> &mut Self {
        self.reporters.push(reporter);
        self
    }

    /// Emite un evento. Los errores de reporters se registran y no cortan la
    /// corrida.
    pub async fn emit(&mut self, kind: RunEventKind) -> RunEvent {
        self.seq += 1;
        let event = RunEvent { seq: self.seq, kind, ts: Utc::now() };
        for reporter in &self.reporters {
            if let Err(err) = reporter.handle(&event).await {
                warn!("reporter failed on '{}': {err}", event.kind.name());
            }
        }
        event
    }
}

/// Reporter en memoria: guarda los eventos en orden de llegada.
#[derive(Debug, Default)]
pub struct InMemoryReporter {
    inner: Mutex<Vec<RunEvent>>,
}

impl InMemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn list(&self) -> Vec<RunEvent> {
        self.inner.lock().await.clone()
    }

    pub async fn names(&self) -> Vec<&'static str> {
        self.inner.lock().await.iter().map(|e| e.kind.name()).collect()
    }

    /// `(título, estado)` de cada veredicto emitido.
    pub async fn verdicts(&self) -> Vec<(String, TestStatus)> {
        self.inner
            .lock()
            .await
            .iter()
            .filter_map(|e| Some((e.kind.test()?.title.clone(), e.kind.verdict()?)))
            .collect()
    }
}

#[async_trait]
impl Reporter for InMemoryReporter {
    async fn handle(&self, event: &RunEvent) -> Result<(), ReporterError> {
        self.inner.lock().await.push(event.clone());
        Ok(())
    }
}
