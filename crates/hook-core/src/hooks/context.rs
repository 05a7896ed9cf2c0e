//! Estado compartido por todos los hooks de una corrida.
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Entrada de log emitida por un hook. `seq` es estrictamente creciente
/// dentro de la corrida aunque dos entradas compartan timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookLogEntry {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub content: String,
}

/// `stash` y `logs` viven toda la corrida y nunca se reinician.
#[derive(Debug, Clone)]
pub struct HookContext {
    stash: Map<String, Value>,
    logs: Vec<HookLogEntry>,
}

impl Default for HookContext {
    fn default() -> Self {
        Self::new()
    }
}

impl HookContext {
    pub fn new() -> Self {
        Self { stash: Map::new(), logs: Vec::new() }
    }

    pub fn stash(&self) -> &Map<String, Value> {
        &self.stash
    }

    pub fn stash_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.stash
    }

    pub fn stash_value(&self) -> Value {
        Value::Object(self.stash.clone())
    }

    /// Reemplaza el stash con la copia devuelta por el sandbox. Valores que
    /// no son objeto se ignoran.
    pub fn replace_stash(&mut self, stash: Value) {
        if let Value::Object(map) = stash {
            self.stash = map;
        }
    }

    pub fn log(&mut self, content: impl Into<String>) -> &HookLogEntry {
        self.push_log(Utc::now(), content.into())
    }

    /// Registra una entrada con el timestamp (ms) que reportó el sandbox.
    pub fn log_at_millis(&mut self, timestamp_ms: i64, content: impl Into<String>) -> &HookLogEntry {
        let timestamp = DateTime::from_timestamp_millis(timestamp_ms).unwrap_or_else(Utc::now);
        self.push_log(timestamp, content.into())
    }

    fn push_log(&mut self, timestamp: DateTime<Utc>, content: String) -> &HookLogEntry {
        info!(target: "hooks", "{content}");
        let seq = self.logs.len() as u64 + 1;
        self.logs.push(HookLogEntry { seq, timestamp, content });
        &self.logs[self.logs.len() - 1]
    }

    pub fn logs(&self) -> &[HookLogEntry] {
        &self.logs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn log_sequence_is_monotonic() {
        let mut ctx = HookContext::new();
        ctx.log("a");
        ctx.log_at_millis(0, "b");
        ctx.log("c");
        let seqs: Vec<u64> = ctx.logs().iter().map(|l| l.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(ctx.logs()[1].timestamp.timestamp_millis(), 0);
    }

    #[test]
    fn replace_stash_ignores_non_objects() {
        let mut ctx = HookContext::new();
        ctx.replace_stash(json!({ "token": "x" }));
        ctx.replace_stash(json!("oops"));
        assert_eq!(ctx.stash_value(), json!({ "token": "x" }));
    }
}
