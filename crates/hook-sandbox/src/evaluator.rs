//! Evaluador QuickJS de un hook individual.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;
use rquickjs::{Coerced, Context, Ctx, Runtime, Value as JsValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::SandboxError;
use crate::prelude::PRELUDE;

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);
const DEFAULT_MEMORY_LIMIT: usize = 32 * 1024 * 1024;

/// Entrada de log producida por `log(content)` dentro del sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxLog {
    /// Milisegundos desde epoch según el reloj del motor JS.
    pub timestamp: i64,
    pub content: String,
}

/// Resultado de una evaluación exitosa: copias de datos y stash tras el hook.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SandboxOutcome {
    pub data: Value,
    #[serde(default)]
    pub stash: Value,
    #[serde(default)]
    pub logs: Vec<SandboxLog>,
}

#[derive(Debug, Clone)]
pub struct SandboxEvaluator {
    timeout: Duration,
    memory_limit: usize,
}

impl Default for SandboxEvaluator {
    fn default() -> Self {
        Self { timeout: DEFAULT_TIMEOUT,
               memory_limit: DEFAULT_MEMORY_LIMIT }
    }
}

impl SandboxEvaluator {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout, ..Self::default() }
    }

    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = bytes;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Evalúa `source` (un literal de función) aplicado a `data`.
    ///
    /// Si el hook lanza o vence el tiempo, se devuelve sólo el error: ningún
    /// cambio parcial sale del sandbox.
    pub fn evaluate(&self, source: &str, data: &Value, stash: &Value) -> Result<SandboxOutcome, SandboxError> {
        let stash = if stash.is_object() { stash.clone() } else { Value::Object(Default::default()) };
        let script = format!(
            "{PRELUDE}\nvar __hook = (\n{source}\n);\n\
             if (typeof __hook !== 'function') {{ throw new TypeError('hook source is not a function'); }}\n\
             __hook(__data);\n\
             JSON.stringify({{ data: __data, stash: stash, logs: __logs }});"
        );
        let inputs = [("__data", serde_json::to_string(data)?), ("stash", serde_json::to_string(&stash)?)];
        let output = self.run_script(&inputs, &script)?;
        let outcome: SandboxOutcome = serde_json::from_str(&output)?;
        debug!("sandbox:evaluate done logs={}", outcome.logs.len());
        Ok(outcome)
    }

    /// Ejecuta `script` en un runtime nuevo y devuelve el string que produce
    /// su última expresión.
    pub(crate) fn run_script(&self, inputs: &[(&str, String)], script: &str) -> Result<String, SandboxError> {
        let runtime = Runtime::new().map_err(|err| SandboxError::Engine(err.to_string()))?;
        runtime.set_memory_limit(self.memory_limit);

        let deadline = Instant::now() + self.timeout;
        let interrupted = Arc::new(AtomicBool::new(false));
        let flag = interrupted.clone();
        runtime.set_interrupt_handler(Some(Box::new(move || {
                                          let expired = Instant::now() >= deadline;
                                          if expired {
                                              flag.store(true, Ordering::SeqCst);
                                          }
                                          expired
                                      })));

        let context = Context::full(&runtime).map_err(|err| SandboxError::Engine(err.to_string()))?;
        context.with(|ctx| {
                   let globals = ctx.globals();
                   for (name, json) in inputs {
                       let value = ctx.json_parse(json.as_str())
                                      .map_err(|err| self.classify(&ctx, err, &interrupted))?;
                       globals.set(*name, value)
                              .map_err(|err| self.classify(&ctx, err, &interrupted))?;
                   }
                   ctx.eval::<String, _>(script)
                      .map_err(|err| self.classify(&ctx, err, &interrupted))
               })
    }

    fn classify(&self, ctx: &Ctx<'_>, err: rquickjs::Error, interrupted: &AtomicBool) -> SandboxError {
        if interrupted.load(Ordering::SeqCst) {
            return SandboxError::Timeout(self.timeout);
        }
        if !err.is_exception() {
            return SandboxError::Engine(err.to_string());
        }
        let (name, message) = describe_exception(&ctx.catch());
        SandboxError::Thrown { name, message }
    }
}

fn describe_exception(thrown: &JsValue<'_>) -> (String, String) {
    if let Some(object) = thrown.as_object() {
        let name = object.get::<_, Option<String>>("name")
                         .ok()
                         .flatten()
                         .unwrap_or_else(|| "Error".to_string());
        let message = object.get::<_, Option<String>>("message").ok().flatten().unwrap_or_default();
        return (name, message);
    }
    let message = thrown.get::<Coerced<String>>()
                        .map(|coerced| coerced.0)
                        .unwrap_or_else(|_| "unknown exception".to_string());
    ("Error".to_string(), message)
}
