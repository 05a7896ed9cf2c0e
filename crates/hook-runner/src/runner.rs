//! `TransactionRunner`: recorre las fases de hooks alrededor de cada
//! transacción y convierte el resultado en un veredicto por transacción.
//!
//! Notas
//! - Todo es secuencial: una transacción termina todas sus fases antes de
//!   empezar la siguiente, y los hooks de una fase corren en orden de
//!   registro.
//! - El `RunLatch` se consulta en cada frontera de fase; si el handler
//!   externo murió la corrida se aborta con `RunError::HandlerFailed`.
//! - Un error de hook (no aserción) se emite como `test error` una sola vez
//!   por transacción y suprime su veredicto posterior.
use std::sync::Arc;

use chrono::Utc;
use hook_core::{FailReason, HandlerFailure, Hook, HookContext, HookError, HookPhase, HookRegistry, HookTarget,
                HttpClient, RawTransaction, Reporter, ReporterHub, RunConfig, RunEventKind, RunLatch, RunStats,
                Severity, TestReport, TestStatus, Transaction, TransactionError, ValidationResult, Validator};
use hook_sandbox::SandboxEvaluator;
use hook_worker::HooksWorkerClient;
use log::{debug, info, warn};
use serde_json::{json, Value};

use crate::configure::configure_transactions;
use crate::errors::RunError;
use crate::loader::load_hooks;
use crate::sort::sort_transactions;

pub struct TransactionRunner {
    config: RunConfig,
    registry: HookRegistry,
    context: HookContext,
    reporters: ReporterHub,
    http: Arc<dyn HttpClient>,
    validator: Arc<dyn Validator>,
    sandbox: SandboxEvaluator,
    latch: RunLatch,
    worker: Option<HooksWorkerClient>,
    stats: RunStats,
    /// La transacción en curso ya emitió `test error`.
    errored: bool,
}

impl TransactionRunner {
    pub fn new(config: RunConfig, http: Arc<dyn HttpClient>, validator: Arc<dyn Validator>) -> Self {
        let sandbox = SandboxEvaluator::new(config.sandbox_timeout);
        Self { config,
               registry: HookRegistry::new(),
               context: HookContext::new(),
               reporters: ReporterHub::new(),
               http,
               validator,
               sandbox,
               latch: RunLatch::new(),
               worker: None,
               stats: RunStats::default(),
               errored: false }
    }

    pub fn add_reporter(&mut self, reporter: Arc<dyn Reporter>) -> &mut Self {
        self.reporters.add(reporter);
        self
    }

    /// Para registrar hooks nativos antes de la corrida.
    pub fn registry_mut(&mut self) -> &mut HookRegistry {
        &mut self.registry
    }

    pub fn registry(&self) -> &HookRegistry {
        &self.registry
    }

    pub fn context(&self) -> &HookContext {
        &self.context
    }

    pub fn latch(&self) -> &RunLatch {
        &self.latch
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Corrida completa a partir de transacciones crudas.
    pub async fn run(&mut self, raw: &[RawTransaction]) -> Result<RunStats, RunError> {
        let mut transactions = configure_transactions(raw, &self.config)?;
        self.execute(&mut transactions).await
    }

    /// Corrida sobre transacciones ya configuradas. Al volver, `transactions`
    /// refleja lo que hicieron hooks y validación.
    pub async fn execute(&mut self, transactions: &mut [Transaction]) -> Result<RunStats, RunError> {
        self.reporters.emit(RunEventKind::Start).await;
        if self.config.sorted {
            sort_transactions(transactions);
        }
        self.worker = load_hooks(&self.config,
                                 &mut self.registry,
                                 &mut self.context,
                                 &self.sandbox,
                                 &self.latch).await?;

        let outcome = self.execute_all(transactions).await;

        if let Some(worker) = self.worker.take() {
            if let Err(err) = worker.stop().await {
                warn!("Unable to stop the hooks handler: {err}");
            }
        }
        outcome?;

        let stats = self.stats;
        self.reporters.emit(RunEventKind::End { stats }).await;
        info!("run finished: {} tests, {} passing, {} failing, {} errors, {} skipped",
              stats.tests, stats.passes, stats.failures, stats.errors, stats.skipped);
        Ok(stats)
    }

    async fn execute_all(&mut self, transactions: &mut [Transaction]) -> Result<(), HandlerFailure> {
        self.latch.check()?;
        self.run_hooks(HookPhase::BeforeAll, None, &mut HookTarget::Transactions(&mut *transactions))
            .await;
        self.latch.check()?;

        for (index, transaction) in transactions.iter_mut().enumerate() {
            debug!("Processing transaction #{}: {}", index + 1, transaction.name);
            self.errored = false;

            self.run_hooks(HookPhase::BeforeEach, None, &mut HookTarget::Transaction(&mut *transaction))
                .await;
            self.latch.check()?;
            let name = transaction.name.clone();
            self.run_hooks(HookPhase::Before, Some(&name), &mut HookTarget::Transaction(&mut *transaction))
                .await;
            self.latch.check()?;

            self.execute_transaction(transaction).await?;
            self.latch.check()?;

            self.run_hooks(HookPhase::AfterEach, None, &mut HookTarget::Transaction(&mut *transaction))
                .await;
            self.latch.check()?;
            let name = transaction.name.clone();
            self.run_hooks(HookPhase::After, Some(&name), &mut HookTarget::Transaction(&mut *transaction))
                .await;
            self.latch.check()?;

            debug!("Evaluating results of transaction execution #{}: {}", index + 1, transaction.name);
            self.emit_result(transaction).await;
        }

        self.run_hooks(HookPhase::AfterAll, None, &mut HookTarget::Transactions(&mut *transactions))
            .await;
        self.latch.check()?;
        Ok(())
    }

    /// Política de skip/fail, intercambio HTTP y validación.
    async fn execute_transaction(&mut self, transaction: &mut Transaction) -> Result<(), HandlerFailure> {
        transaction.started_at = Some(Utc::now().timestamp_millis());
        let test = TestReport::for_transaction(transaction);
        self.reporters.emit(RunEventKind::TestStart(test.clone())).await;
        ensure_transaction_errors(transaction);

        if transaction.skip {
            debug!("HTTP transaction was marked in hooks as to be skipped. Skipping");
            transaction.test = Some(test);
            skip_transaction(transaction, Some("Skipped in before hook".to_string()));
            return Ok(());
        }
        if let Some(reason) = transaction.fail_reason() {
            debug!("HTTP transaction was marked in hooks as to be failed. Reporting as failed");
            transaction.test = Some(test);
            fail_transaction(transaction, Some(format!("Failed in before hook: {reason}")));
            return Ok(());
        }
        if self.config.dry_run {
            info!("Dry run. Not performing HTTP request");
            transaction.test = Some(test);
            skip_transaction(transaction, None);
            return Ok(());
        }
        if self.config.names {
            info!(target: "reporter", "{}", transaction.name);
            transaction.test = Some(test);
            skip_transaction(transaction, None);
            return Ok(());
        }
        if !self.config.method.is_empty()
           && !self.config.method.iter().any(|m| m.eq_ignore_ascii_case(&transaction.request.method))
        {
            debug!("Only {} requests are set to be executed. Not performing HTTP {} request.",
                   self.config.method.iter().map(|m| m.to_uppercase()).collect::<Vec<_>>().join(", "),
                   transaction.request.method.to_uppercase());
            transaction.test = Some(test);
            skip_transaction(transaction, None);
            return Ok(());
        }
        if !self.config.only.is_empty() && !self.config.only.contains(&transaction.name) {
            debug!("Only '{}' transaction is set to be executed. Not performing HTTP request for '{}'.",
                   self.config.only.join(","),
                   transaction.name);
            transaction.test = Some(test);
            skip_transaction(transaction, None);
            return Ok(());
        }

        self.perform_and_validate(test, transaction).await
    }

    async fn perform_and_validate(&mut self,
                                  mut test: TestReport,
                                  transaction: &mut Transaction)
                                  -> Result<(), HandlerFailure> {
        match self.http.perform(transaction).await {
            Ok(real) => transaction.real = Some(real),
            Err(err) => {
                debug!("Requesting tested server errored: {err}");
                test.title = transaction.id.clone();
                test.expected = Some(transaction.expected.clone());
                test.request = Some(transaction.request.clone());
                self.emit_error(err.to_string(), test).await;
                return Ok(());
            }
        }

        self.run_hooks(HookPhase::BeforeEachValidation,
                       None,
                       &mut HookTarget::Transaction(&mut *transaction))
            .await;
        self.latch.check()?;
        let name = transaction.name.clone();
        self.run_hooks(HookPhase::BeforeValidation,
                       Some(&name),
                       &mut HookTarget::Transaction(&mut *transaction))
            .await;
        self.latch.check()?;

        self.validate_transaction(test, transaction).await;
        Ok(())
    }

    async fn validate_transaction(&mut self, mut test: TestReport, transaction: &mut Transaction) {
        debug!("Validating HTTP transaction");
        let real = transaction.real.clone().unwrap_or_default();
        let result = match self.validator.validate(&transaction.expected, &real) {
            Ok(result) => result,
            Err(err) => {
                debug!("validation errored: {err}");
                self.emit_error(err.to_string(), test.clone()).await;
                ValidationResult::default()
            }
        };

        test.title = transaction.id.clone();
        test.actual = Some(real.clone());
        test.expected = Some(transaction.expected.clone());
        test.request = Some(transaction.request.clone());
        test.status = Some(if result.valid { TestStatus::Pass } else { TestStatus::Fail });

        let empty_status = matches!(transaction.expected.status_code.trim(), "204" | "205")
                           || matches!(real.status_code, 204 | 205);
        let has_body = transaction.expected.body.as_deref().is_some_and(|b| !b.is_empty()) || !real.body.is_empty();
        if empty_status && has_body {
            warn!("{} HTTP 204 and 205 responses must not include a message body: https://tools.ietf.org/html/rfc7231#section-6.3",
                  test.title);
        }

        test.message = result.message();
        merge_validation(transaction, &result);
        test.valid = Some(result.valid);
        test.errors = transaction.errors.clone();
        test.results = transaction.results.clone();
        transaction.test = Some(test);
    }

    /// Corre los hooks de `phase` sobre `target`, en orden de registro.
    async fn run_hooks(&mut self, phase: HookPhase, name: Option<&str>, target: &mut HookTarget<'_>) {
        let hooks = self.registry.hooks_for(phase, name).to_vec();
        if hooks.is_empty() {
            return;
        }
        debug!("Running '{phase}' hooks");
        for hook in hooks {
            if self.latch.is_tripped() {
                return;
            }
            let result = match hook {
                Hook::Native(callback) => callback.call(target, &mut self.context).await,
                Hook::Sandboxed(source) => self.run_sandboxed(source, target).await,
            };
            match result {
                Ok(()) => {}
                Err(HookError::Assertion(message)) => {
                    for transaction in target.transactions_mut() {
                        fail_transaction(transaction, Some(format!("Failed assertion in hooks: {message}")));
                    }
                }
                // consecuencia de la caída del handler, la aborta el latch
                Err(err) if self.latch.is_tripped() => debug!("Hook errored after the hooks handler failed: {err}"),
                Err(err) => {
                    debug!("Hook errored: {err}");
                    self.emit_hook_error(phase, &err, target).await;
                }
            }
        }
    }

    async fn run_sandboxed(&mut self, source: String, target: &mut HookTarget<'_>) -> Result<(), HookError> {
        let data = target.to_value()?;
        let stash = self.context.stash_value();
        let sandbox = self.sandbox.clone();
        let outcome = tokio::task::spawn_blocking(move || sandbox.evaluate(&source, &data, &stash))
            .await
            .map_err(|e| HookError::Sandbox(e.to_string()))?
            .map_err(|e| {
                if e.is_assertion() {
                    HookError::Assertion(e.message())
                } else {
                    HookError::Sandbox(e.to_string())
                }
            })?;
        target.apply(&outcome.data)?;
        self.context.replace_stash(outcome.stash);
        for entry in outcome.logs {
            self.context.log_at_millis(entry.timestamp, entry.content);
        }
        Ok(())
    }

    async fn emit_hook_error(&mut self, phase: HookPhase, error: &HookError, target: &mut HookTarget<'_>) {
        let test = match target.transaction_mut() {
            Some(transaction) => {
                let mut test = TestReport::for_transaction(transaction);
                test.request = Some(transaction.request.clone());
                test
            }
            None => {
                // fases `All`: no cuentan como error de una transacción puntual
                let test = TestReport { title: phase.to_string(),
                                        message: error.to_string(),
                                        ..TestReport::default() };
                self.stats.record(TestStatus::Error);
                self.reporters
                    .emit(RunEventKind::TestError { error: error.to_string(), test })
                    .await;
                return;
            }
        };
        self.emit_error(error.to_string(), test).await;
    }

    /// `test error` para la transacción en curso; sólo el primero se emite.
    async fn emit_error(&mut self, error: String, test: TestReport) {
        if self.errored {
            debug!("transaction already reported an error, not emitting: {error}");
            return;
        }
        self.errored = true;
        self.stats.record(TestStatus::Error);
        self.reporters.emit(RunEventKind::TestError { error, test }).await;
    }

    async fn emit_result(&mut self, transaction: &mut Transaction) {
        if self.errored || transaction.test.is_none() {
            debug!("No emission of test data to reporters");
            self.errored = false;
            return;
        }

        let kind: fn(TestReport) -> RunEventKind = if transaction.skip {
            RunEventKind::TestSkip
        } else if transaction.test.as_ref().is_some_and(|t| t.valid == Some(true)) {
            match transaction.fail_reason() {
                Some(reason) => {
                    fail_transaction(transaction, Some(format!("Failed in after hook: {reason}")));
                    RunEventKind::TestFail
                }
                None => RunEventKind::TestPass,
            }
        } else {
            RunEventKind::TestFail
        };

        let Some(test) = transaction.test.clone() else {
            return;
        };
        let event = kind(test);
        if let Some(status) = event.verdict() {
            self.stats.record(status);
        }
        self.reporters.emit(event).await;
    }
}

fn ensure_transaction_errors(transaction: &mut Transaction) {
    if !matches!(transaction.results, Some(Value::Object(_))) {
        transaction.results = Some(json!({}));
    }
}

/// `results.general.results`, creándolo si falta.
fn general_results(transaction: &mut Transaction) -> Option<&mut Vec<Value>> {
    ensure_transaction_errors(transaction);
    let Some(Value::Object(results)) = transaction.results.as_mut() else {
        return None;
    };
    let general = results.entry("general").or_insert_with(|| json!({}));
    if !general.is_object() {
        *general = json!({});
    }
    let list = general.as_object_mut()?.entry("results").or_insert_with(|| json!([]));
    if !list.is_array() {
        *list = json!([]);
    }
    list.as_array_mut()
}

/// Funde la salida del validador en `results`: `valid` se reemplaza y cada
/// sección de `fields` se escribe por nombre. El resto de las claves (p.ej.
/// `general`) queda como lo dejaron los hooks.
fn merge_validation(transaction: &mut Transaction, validation: &ValidationResult) {
    ensure_transaction_errors(transaction);
    let Some(Value::Object(results)) = transaction.results.as_mut() else {
        return;
    };
    results.insert("valid".to_string(), Value::Bool(validation.valid));
    let fields = results.entry("fields").or_insert_with(|| json!({}));
    if !fields.is_object() {
        *fields = json!({});
    }
    let Some(fields) = fields.as_object_mut() else {
        return;
    };
    for (name, section) in &validation.fields {
        match serde_json::to_value(section) {
            Ok(value) => {
                fields.insert(name.clone(), value);
            }
            Err(err) => warn!("unable to record validation of '{name}': {err}"),
        }
    }
}

/// Copia a `transaction.test` lo que el reporter necesita ver.
fn ensure_test_structure(transaction: &mut Transaction) {
    if let Some(test) = transaction.test.as_mut() {
        test.request = Some(transaction.request.clone());
        test.expected = Some(transaction.expected.clone());
        test.actual = transaction.real.clone();
        test.errors = transaction.errors.clone();
        test.results = transaction.results.clone();
    }
}

fn fail_transaction(transaction: &mut Transaction, reason: Option<String>) {
    transaction.fail = Some(FailReason::Flag(true));
    mark(transaction, TestStatus::Fail, Severity::Error, reason);
}

fn skip_transaction(transaction: &mut Transaction, reason: Option<String>) {
    transaction.skip = true;
    mark(transaction, TestStatus::Skip, Severity::Warning, reason);
}

fn mark(transaction: &mut Transaction, status: TestStatus, severity: Severity, reason: Option<String>) {
    ensure_transaction_errors(transaction);
    if let Some(reason) = &reason {
        let error = TransactionError { severity, message: reason.clone() };
        if let (Some(general), Ok(value)) = (general_results(transaction), serde_json::to_value(&error)) {
            general.push(value);
        }
        transaction.errors.push(error);
    }
    if transaction.test.is_none() {
        transaction.test = Some(TestReport::for_transaction(transaction));
    }
    if let Some(test) = transaction.test.as_mut() {
        test.status = Some(status);
        if let Some(reason) = reason {
            test.message = reason;
        }
    }
    ensure_test_structure(transaction);
}
