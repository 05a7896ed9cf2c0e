//! Ciclo de vida del handler externo: arranque, conexión, registro de
//! hooks y apagado.
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use hook_core::{Hook, HookContext, HookError, HookPhase, HookRegistry, HookTarget, HandlerFailure, RunConfig,
                RunLatch, WorkerConfig};
use hook_process::{spawn, ManagedProcess, ProcessSpec, TerminateOptions};
use log::{debug, info, warn};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

use crate::command::{resolve_handler_command, HandlerCommand};
use crate::connection::WorkerConnection;
use crate::errors::WorkerError;
use crate::hook::WorkerHook;

const HANDLER_LABEL: &str = "Hooks handler";

/// Fases que el handler recibe por el socket.
const FORWARDED_PHASES: [HookPhase; 5] = [HookPhase::BeforeEach,
                                          HookPhase::BeforeEachValidation,
                                          HookPhase::AfterEach,
                                          HookPhase::BeforeAll,
                                          HookPhase::AfterAll];

pub struct HooksWorkerClient {
    config: WorkerConfig,
    handler: ManagedProcess,
    connection: Arc<WorkerConnection>,
    command_line: String,
}

impl HooksWorkerClient {
    /// Lanza el handler, se conecta y registra sus hooks en `registry`.
    ///
    /// Una salida inesperada del handler en cualquier momento dispara `latch`.
    pub async fn start(config: &RunConfig,
                       hookfiles: &[PathBuf],
                       registry: &mut HookRegistry,
                       latch: &RunLatch)
                       -> Result<Self, WorkerError> {
        let command = resolve_handler_command(&config.language).await?;
        let handler = spawn_handler(&command, hookfiles, config)?;
        let command_line = command_line(&command, hookfiles);
        watch_for_crash(handler.clone(), command_line.clone(), latch.clone());

        let worker = &config.worker;
        let stream = match connect_with_retry(worker, latch).await {
            Ok(stream) => stream,
            Err(err) => {
                let options = TerminateOptions { timeout: worker.term_timeout,
                                                 retry_delay: worker.term_retry,
                                                 force: true };
                if let Err(term_err) = handler.terminate(options).await {
                    warn!("Unable to stop the hooks handler after a failed connection: {term_err}");
                }
                return Err(err);
            }
        };

        let connection = Arc::new(WorkerConnection::new(stream, worker.timeout, latch.clone()));
        for phase in FORWARDED_PHASES {
            registry.add(phase, None, Hook::callback(WorkerHook::new(phase, connection.clone())))
                    .map_err(|e| WorkerError::Setup(e.to_string()))?;
        }
        if config.test_handler_order {
            registry.after_all(Hook::native(check_handler_order));
        }

        Ok(Self { config: worker.clone(),
                  handler,
                  connection,
                  command_line })
    }

    pub fn handler(&self) -> &ManagedProcess {
        &self.handler
    }

    pub fn connection(&self) -> &Arc<WorkerConnection> {
        &self.connection
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    /// Cierra la conexión y termina el handler (forzando si hace falta).
    pub async fn stop(&self) -> Result<(), WorkerError> {
        self.connection.close().await;
        if self.handler.has_terminated() {
            debug!("The hooks handler process has already terminated");
            return Ok(());
        }
        debug!("Terminating hooks handler process, PID {}", self.handler.pid());
        let options = TerminateOptions { timeout: self.config.term_timeout,
                                         retry_delay: self.config.term_retry,
                                         force: true };
        self.handler.terminate(options).await?;
        self.handler.wait().await;
        Ok(())
    }
}

fn spawn_handler(command: &HandlerCommand,
                 hookfiles: &[PathBuf],
                 config: &RunConfig)
                 -> Result<ManagedProcess, WorkerError> {
    let mut args = command.args.clone();
    args.extend(hookfiles.iter().map(|p| p.to_string_lossy().into_owned()));
    info!("Starting hooks handler: {} {}", command.program, args.join(" "));
    let mut spec = ProcessSpec::new(command.program.clone(), args).label(HANDLER_LABEL);
    if let Some(cwd) = &config.custom_cwd {
        spec = spec.current_dir(cwd.clone());
    }
    Ok(spawn(spec)?)
}

fn command_line(command: &HandlerCommand, hookfiles: &[PathBuf]) -> String {
    let mut line = command.display();
    for file in hookfiles {
        line.push(' ');
        line.push_str(&file.to_string_lossy());
    }
    line
}

fn watch_for_crash(handler: ManagedProcess, command_line: String, latch: RunLatch) {
    tokio::spawn(async move {
        let Some(crash) = handler.crashed().await else {
            debug!("{HANDLER_LABEL} exited as expected");
            return;
        };
        let message = if crash.killed {
            format!("{HANDLER_LABEL} process '{command_line}' was killed.")
        } else {
            let code = crash.exit_code.map_or_else(|| "null".to_string(), |c| c.to_string());
            format!("{HANDLER_LABEL} process '{command_line}' exited with status: {code}")
        };
        latch.trip(HandlerFailure::new(message));
    });
}

async fn connect_with_retry(worker: &WorkerConfig, latch: &RunLatch) -> Result<TcpStream, WorkerError> {
    let address = (worker.handler_host.as_str(), worker.handler_port);
    let started = Instant::now();
    loop {
        latch.check().map_err(|f| WorkerError::Handler(f.message))?;
        let remaining = worker.connect_timeout.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            break;
        }
        match timeout(remaining, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => {
                debug!("Successfully connected to hooks handler. Waiting {}s to start testing.",
                       worker.after_connect_wait.as_secs_f64());
                sleep(worker.after_connect_wait).await;
                latch.check().map_err(|f| WorkerError::Handler(f.message))?;
                return Ok(stream);
            }
            Ok(Err(err)) => {
                debug!("connect to {}:{} failed: {err}", worker.handler_host, worker.handler_port);
                warn!("Error connecting to the hooks handler process. Is the handler running? Retrying.");
            }
            Err(_) => break,
        }
        if started.elapsed() >= worker.connect_timeout {
            break;
        }
        sleep(worker.connect_retry).await;
    }
    Err(WorkerError::ConnectTimeout { host: worker.handler_host.clone(),
                                      port: worker.handler_port,
                                      timeout: worker.connect_timeout })
}

/// `afterAll` de prueba: imprime las modificaciones que el handler dejó en
/// la primera transacción, en el orden en que las hizo.
fn check_handler_order(target: &mut HookTarget<'_>, _context: &mut HookContext) -> Result<(), HookError> {
    eprintln!("FOR TESTING ONLY");
    let modifications = target.transactions()
                              .first()
                              .and_then(|t| t.extra.get("hooks_modifications"))
                              .and_then(Value::as_array)
                              .filter(|m| !m.is_empty())
                              .ok_or_else(|| {
                                  HookError::Failed("Hooks must modify transaction.hooks_modifications".to_string())
                              })?;
    for (index, modification) in modifications.iter().enumerate() {
        match modification {
            Value::String(text) => eprintln!("{index} {text}"),
            other => eprintln!("{index} {other}"),
        }
    }
    eprintln!("FOR TESTING ONLY");
    Ok(())
}
