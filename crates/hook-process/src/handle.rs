//! `ManagedProcess`: handle clonable sobre un proceso hijo vivo.
//!
//! El `Child` de tokio vive en una tarea vigilante que espera su salida y
//! atiende pedidos de kill; el handle sólo habla con esa tarea por canales,
//! de modo que cualquier clon puede señalizar o esperar la salida.
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use log::debug;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};
use tokio::sync::{mpsc, oneshot, watch, Mutex};

use crate::errors::ProcessError;
use crate::exit::{CrashReport, ExitReport};

/// Qué se lanza y cómo se lo nombra en los logs.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    pub label: String,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        let program = program.into();
        Self { label: program.clone(),
               program,
               args,
               current_dir: None }
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

const INTENT_NONE: u8 = 0;
const INTENT_TERMINATED: u8 = 1;
const INTENT_KILLED: u8 = 2;

struct Ledger {
    intent: AtomicU8,
    term_attempts: AtomicUsize,
}

impl Ledger {
    /// Kill pisa a term; term nunca pisa a kill. Así queda a lo sumo un flag.
    fn mark(&self, intent: u8) {
        let _ = self.intent.fetch_max(intent, Ordering::SeqCst);
    }

    fn flags(&self) -> (bool, bool) {
        match self.intent.load(Ordering::SeqCst) {
            INTENT_KILLED => (true, false),
            INTENT_TERMINATED => (false, true),
            _ => (false, false),
        }
    }
}

enum Control {
    Kill(oneshot::Sender<std::io::Result<()>>),
}

#[derive(Clone)]
pub struct ManagedProcess {
    pid: u32,
    label: Arc<str>,
    ledger: Arc<Ledger>,
    control: mpsc::Sender<Control>,
    exit: watch::Receiver<Option<ExitReport>>,
    stdin: Arc<Mutex<Option<ChildStdin>>>,
}

/// Lanza el proceso con stdio en pipes. Debe llamarse dentro de un runtime
/// tokio: stdout/stderr se reenvían a `log::debug!` línea por línea.
pub fn spawn(spec: ProcessSpec) -> Result<ManagedProcess, ProcessError> {
    let mut command = Command::new(&spec.program);
    command.args(&spec.args)
           .stdin(Stdio::piped())
           .stdout(Stdio::piped())
           .stderr(Stdio::piped());
    if let Some(dir) = &spec.current_dir {
        command.current_dir(dir);
    }

    let mut child = command.spawn()
                           .map_err(|source| ProcessError::Spawn { program: spec.program.clone(), source })?;
    let pid = child.id().ok_or_else(|| ProcessError::Spawn { program: spec.program.clone(),
                                                              source: std::io::Error::other("process exited before reporting a pid") })?;
    let label: Arc<str> = Arc::from(spec.label.as_str());
    debug!("spawn:done label={label} pid={pid} args={:?}", spec.args);

    if let Some(stdout) = child.stdout.take() {
        forward_lines(stdout, label.clone(), "stdout");
    }
    if let Some(stderr) = child.stderr.take() {
        forward_lines(stderr, label.clone(), "stderr");
    }
    let stdin = Arc::new(Mutex::new(child.stdin.take()));

    let ledger = Arc::new(Ledger { intent: AtomicU8::new(INTENT_NONE),
                                   term_attempts: AtomicUsize::new(0) });
    let (control_tx, mut control_rx) = mpsc::channel::<Control>(4);
    let (exit_tx, exit_rx) = watch::channel(None);

    let watcher_ledger = ledger.clone();
    let watcher_label = label.clone();
    tokio::spawn(async move {
        let status = loop {
            tokio::select! {
                status = child.wait() => break status,
                control = control_rx.recv() => match control {
                    Some(Control::Kill(ack)) => {
                        let _ = ack.send(child.start_kill());
                    }
                    None => break child.wait().await,
                },
            }
        };
        let (killed, terminated) = watcher_ledger.flags();
        let report = ExitReport::from_wait(status, killed, terminated);
        debug!("exit:observed label={watcher_label} pid={pid} code={:?} signal={:?} killed={} terminated={}",
               report.code, report.signal, killed, terminated);
        exit_tx.send_replace(Some(report));
    });

    Ok(ManagedProcess { pid,
                        label,
                        ledger,
                        control: control_tx,
                        exit: exit_rx,
                        stdin })
}

fn forward_lines<R>(reader: R, label: Arc<str>, stream: &'static str)
    where R: AsyncRead + Unpin + Send + 'static
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => debug!("{label} {stream}: {line}"),
                Ok(None) => break,
                Err(err) => {
                    debug!("{label} {stream}: read error {err}");
                    break;
                }
            }
        }
    });
}

impl ManagedProcess {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// `true` una vez observada la salida.
    pub fn has_terminated(&self) -> bool {
        self.exit.borrow().is_some()
    }

    pub fn exit_report(&self) -> Option<ExitReport> {
        *self.exit.borrow()
    }

    pub fn killed_intentionally(&self) -> bool {
        self.exit_report().is_some_and(|r| r.killed_intentionally)
    }

    pub fn terminated_intentionally(&self) -> bool {
        self.exit_report().is_some_and(|r| r.terminated_intentionally)
    }

    /// Cantidad de señales cooperativas enviadas hasta ahora.
    pub fn term_attempts(&self) -> usize {
        self.ledger.term_attempts.load(Ordering::SeqCst)
    }

    /// Espera la salida del proceso (cancel-safe, se puede llamar desde
    /// varios clones a la vez).
    pub async fn wait(&self) -> ExitReport {
        let mut rx = self.exit.clone();
        let observed = match rx.wait_for(Option::is_some).await {
            Ok(report) => *report,
            Err(_) => None,
        };
        observed.unwrap_or_default()
    }

    /// Espera la salida y devuelve el crash si la salida no fue pedida.
    pub async fn crashed(&self) -> Option<CrashReport> {
        self.wait().await.crash()
    }

    /// Terminación forzada inmediata (SIGKILL / TerminateProcess).
    pub async fn signal_kill(&self) -> Result<(), ProcessError> {
        self.ledger.mark(INTENT_KILLED);
        debug!("signal_kill pid={}", self.pid);
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.control.send(Control::Kill(ack_tx)).await.is_err() {
            // la tarea vigilante ya terminó: el proceso salió
            return Ok(());
        }
        match ack_rx.await {
            Ok(result) => result.map_err(|source| ProcessError::Signal { pid: self.pid,
                                                                          signal: "SIGKILL",
                                                                          source }),
            Err(_) => Ok(()),
        }
    }

    /// Pedido cooperativo de salida.
    ///
    /// En unix es SIGTERM. En plataformas sin señales POSIX se escribe el
    /// carácter de control ETX en stdin del hijo.
    pub async fn signal_term(&self) -> Result<(), ProcessError> {
        self.ledger.mark(INTENT_TERMINATED);
        self.ledger.term_attempts.fetch_add(1, Ordering::SeqCst);
        debug!("signal_term pid={}", self.pid);
        self.send_term().await
    }

    #[cfg(unix)]
    async fn send_term(&self) -> Result<(), ProcessError> {
        crate::signal::send_term(self.pid).map_err(|source| ProcessError::Signal { pid: self.pid,
                                                                                   signal: "SIGTERM",
                                                                                   source })
    }

    #[cfg(not(unix))]
    async fn send_term(&self) -> Result<(), ProcessError> {
        self.write_stdin(&[crate::signal::TERM_CONTROL_CHAR]).await
    }

    /// Escribe bytes crudos en stdin del hijo.
    pub async fn write_stdin(&self, bytes: &[u8]) -> Result<(), ProcessError> {
        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or(ProcessError::StdinClosed { pid: self.pid })?;
        let written = async {
            stdin.write_all(bytes).await?;
            stdin.flush().await
        };
        written.await.map_err(|source| ProcessError::Signal { pid: self.pid,
                                                              signal: "stdin write",
                                                              source })
    }
}

impl std::fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedProcess")
         .field("pid", &self.pid)
         .field("label", &self.label)
         .field("exit", &self.exit_report())
         .finish()
    }
}
