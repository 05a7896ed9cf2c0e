//! Resolución del comando del handler de hooks según el lenguaje.
use std::env;
use std::path::{Path, PathBuf};

use hook_core::config::is_javascript;
use log::debug;
use tokio::process::Command;

use crate::errors::WorkerError;

/// Programa y argumentos fijos del handler (los hookfiles se agregan al
/// lanzarlo).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl HandlerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(),
               args: Vec::new() }
    }

    /// Comando completo, para mensajes.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str))
                                              .collect::<Vec<_>>()
                                              .join(" ")
    }
}

struct KnownHandler {
    language: &'static str,
    display: &'static str,
    command: &'static str,
    install_hint: &'static str,
}

const KNOWN_HANDLERS: &[KnownHandler] = &[KnownHandler { language: "ruby",
                                                         display: "Ruby",
                                                         command: "dredd-hooks-ruby",
                                                         install_hint: "$ gem install dredd_hooks" },
                                          KnownHandler { language: "rust",
                                                         display: "Rust",
                                                         command: "dredd-hooks-rust",
                                                         install_hint: "$ cargo install dredd-hooks" },
                                          KnownHandler { language: "python",
                                                         display: "Python",
                                                         command: "dredd-hooks-python",
                                                         install_hint: "$ pip install dredd_hooks" },
                                          KnownHandler { language: "php",
                                                         display: "PHP",
                                                         command: "dredd-hooks-php",
                                                         install_hint: "$ composer require ddelnano/dredd-hooks-php --dev" },
                                          KnownHandler { language: "perl",
                                                         display: "Perl",
                                                         command: "dredd-hooks-perl",
                                                         install_hint: "$ cpanm Dredd::Hooks" }];

const GO_INSTALL_HINT: &str = "$ go get github.com/snikch/goodman/cmd/goodman";

/// Traduce `language` a un comando ejecutable.
///
/// Lenguajes conocidos usan su handler estándar y exigen que esté en el
/// PATH. `go` busca `goodman` en el directorio de binarios de Go. Cualquier
/// otro valor se interpreta como línea de comando propia.
pub async fn resolve_handler_command(language: &str) -> Result<HandlerCommand, WorkerError> {
    if is_javascript(language) {
        return Err(WorkerError::Setup("Hooks handler should not be used for Node.js. Use native hooks instead.".to_string()));
    }
    if let Some(known) = KNOWN_HANDLERS.iter().find(|h| h.language == language) {
        return known_handler(known);
    }
    if language == "go" {
        let bin_dir = go_bin_dir_with(|key| env::var(key).ok()).await?;
        return go_handler(&bin_dir);
    }
    custom_handler(language)
}

fn known_handler(known: &KnownHandler) -> Result<HandlerCommand, WorkerError> {
    if which::which(known.command).is_err() {
        return Err(WorkerError::Setup(format!("{} hooks handler command not found: {}\nInstall {} hooks handler by running:\n{}",
                                              known.display, known.command, known.language, known.install_hint)));
    }
    Ok(HandlerCommand::new(known.command))
}

fn go_handler(bin_dir: &Path) -> Result<HandlerCommand, WorkerError> {
    let goodman = bin_dir.join("goodman");
    if which::which(&goodman).is_err() {
        return Err(WorkerError::Setup(format!("Go hooks handler command not found: {}\nInstall go hooks handler by running:\n{GO_INSTALL_HINT}",
                                              goodman.display())));
    }
    Ok(HandlerCommand::new(goodman.to_string_lossy()))
}

/// Directorio de binarios de Go: `$GOBIN`, si no `$GOPATH/bin`, si no
/// `$(go env GOPATH)/bin`.
pub async fn go_bin_dir_with<F>(lookup: F) -> Result<PathBuf, WorkerError>
    where F: Fn(&str) -> Option<String>
{
    if let Some(bin) = lookup("GOBIN").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(bin));
    }
    if let Some(path) = lookup("GOPATH").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(path).join("bin"));
    }
    let output = Command::new("go").args(["env", "GOPATH"])
                                   .output()
                                   .await
                                   .map_err(|e| WorkerError::Setup(format!("Go doesn't seem to be installed: {e}")))?;
    if !output.status.success() {
        return Err(WorkerError::Setup(format!("Go doesn't seem to be installed: {}",
                                              String::from_utf8_lossy(&output.stderr).trim())));
    }
    let gopath = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok(PathBuf::from(gopath).join("bin"))
}

fn custom_handler(command_line: &str) -> Result<HandlerCommand, WorkerError> {
    let words = shlex::split(command_line).ok_or_else(|| {
                                              WorkerError::Setup(format!("Invalid hooks handler command: {command_line}"))
                                          })?;
    let mut words = words.into_iter();
    let Some(program) = words.next() else {
        return Err(WorkerError::Setup("Hooks handler command is empty".to_string()));
    };
    let args: Vec<String> = words.collect();
    if which::which(&program).is_err() {
        return Err(WorkerError::Setup(format!("Hooks handler command not found: {program}")));
    }
    debug!("Using '{program}' as a hooks handler command, '{}' as arguments", args.join(" "));
    Ok(HandlerCommand { program, args })
}
