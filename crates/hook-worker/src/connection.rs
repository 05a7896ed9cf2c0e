//! Canal TCP correlacionado con el handler.
//!
//! Cada llamada registra un `oneshot` en la tabla de pendientes bajo un
//! UUID nuevo. La tarea lectora entrega cada respuesta al pendiente de su
//! UUID; el timeout de la llamada compite por la misma entrada. `remove` es
//! atómico, así que sólo uno de los dos la resuelve.
//!
//! Si el handler corta la conexión sin que se haya llamado a `close`, la
//! tarea lectora dispara el `RunLatch` antes de soltar los pendientes.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use hook_core::{HandlerFailure, RunLatch};
use log::{debug, warn};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use uuid::Uuid;

use crate::errors::WorkerError;
use crate::protocol::{MessageBuffer, OutgoingMessage};

type PendingCalls = DashMap<Uuid, oneshot::Sender<Value>>;

#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// Campo `data` de la respuesta (`Null` si no vino).
    Reply(Value),
    TimedOut,
}

pub struct WorkerConnection {
    writer: Mutex<OwnedWriteHalf>,
    pending: Arc<PendingCalls>,
    closed: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    call_timeout: Duration,
}

impl WorkerConnection {
    pub fn new(stream: TcpStream, call_timeout: Duration, latch: RunLatch) -> Self {
        let (read_half, write_half) = stream.into_split();
        let pending: Arc<PendingCalls> = Arc::new(DashMap::new());
        let closed = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(read_loop(read_half, pending.clone(), closed.clone(), latch));
        Self { writer: Mutex::new(write_half),
               pending,
               closed,
               reader,
               call_timeout }
    }

    /// Envía `data` para la fase `event` y espera la respuesta correlacionada.
    ///
    /// Vencido el timeout devuelve `TimedOut`; una respuesta tardía para ese
    /// UUID se ignora en la tarea lectora.
    pub async fn call(&self, event: &str, data: &Value) -> Result<CallOutcome, WorkerError> {
        let uuid = Uuid::new_v4();
        let line = OutgoingMessage { event, uuid: uuid.to_string(), data }.to_line()?;
        let (tx, mut rx) = oneshot::channel();
        self.pending.insert(uuid, tx);
        // insertar antes de mirar `closed`: la lectora marca y luego limpia
        if self.is_closed() {
            self.pending.remove(&uuid);
            return Err(WorkerError::ConnectionClosed);
        }

        debug!("Sending HTTP transaction data to hooks handler: {uuid}");
        let written = async {
            let mut writer = self.writer.lock().await;
            writer.write_all(&line).await?;
            writer.flush().await
        };
        if let Err(err) = written.await {
            self.pending.remove(&uuid);
            return Err(err.into());
        }

        match timeout(self.call_timeout, &mut rx).await {
            Ok(Ok(message)) => Ok(reply(message)),
            Ok(Err(_)) => Err(WorkerError::ConnectionClosed),
            Err(_) if self.pending.remove(&uuid).is_some() => {
                warn!("Hook handling timed out.");
                Ok(CallOutcome::TimedOut)
            }
            // la respuesta ganó la carrera contra el timer
            Err(_) => match rx.await {
                Ok(message) => Ok(reply(message)),
                Err(_) => Err(WorkerError::ConnectionClosed),
            },
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Corta la lectura, cierra la escritura y suelta los pendientes.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.reader.abort();
        if let Err(err) = self.writer.lock().await.shutdown().await {
            debug!("closing hooks handler connection: {err}");
        }
        self.pending.clear();
        debug!("TCP communication with hooks handler closed.");
    }
}

impl Drop for WorkerConnection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn reply(message: Value) -> CallOutcome {
    CallOutcome::Reply(message.get("data").cloned().unwrap_or(Value::Null))
}

async fn read_loop(mut reader: OwnedReadHalf, pending: Arc<PendingCalls>, closed: Arc<AtomicBool>, latch: RunLatch) {
    let mut buffer = MessageBuffer::new();
    let mut chunk = vec![0u8; 8 * 1024];
    let reason = loop {
        let read = match reader.read(&mut chunk).await {
            Ok(0) => break "TCP communication with hooks handler closed.".to_string(),
            Ok(read) => read,
            Err(err) => break format!("TCP communication with hooks handler errored: {err}"),
        };
        debug!("received {read} bytes from hooks handler");
        for message in buffer.push(&chunk[..read]) {
            dispatch(&pending, message);
        }
    };
    debug!("{reason}");
    // el latch queda disparado antes de que los pendientes vean el cierre
    if !closed.load(Ordering::SeqCst) {
        latch.trip(HandlerFailure::new(reason));
    }
    closed.store(true, Ordering::SeqCst);
    pending.clear();
}

fn dispatch(pending: &PendingCalls, message: Value) {
    let Some(raw) = message.get("uuid").and_then(Value::as_str).filter(|s| !s.is_empty()) else {
        debug!("UUID not present in hooks handler message, ignoring: {message}");
        return;
    };
    let Ok(uuid) = Uuid::parse_str(raw) else {
        debug!("unrecognized UUID '{raw}' in hooks handler message, ignoring");
        return;
    };
    match pending.remove(&uuid) {
        Some((_, tx)) => {
            debug!("Dredd-protocol reply received: {uuid}");
            let _ = tx.send(message);
        }
        None => debug!("no pending call for {uuid} (late reply?), ignoring"),
    }
}
