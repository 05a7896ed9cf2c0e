//! Recolección de hooks declarados en un archivo evaluado en el sandbox.
//!
//! El archivo corre una sola vez con las funciones de registro como globales;
//! cada función registrada se guarda como texto fuente para evaluarla luego,
//! aislada, por cada invocación.
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::SandboxError;
use crate::evaluator::{SandboxEvaluator, SandboxLog};
use crate::prelude::{PRELUDE, REGISTRATION};

/// Fuentes de hooks agrupadas por fase, en orden de registro.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedHooks {
    #[serde(default)]
    pub before_all_hooks: Vec<String>,
    #[serde(default)]
    pub after_all_hooks: Vec<String>,
    #[serde(default)]
    pub before_each_hooks: Vec<String>,
    #[serde(default)]
    pub before_each_validation_hooks: Vec<String>,
    #[serde(default)]
    pub after_each_hooks: Vec<String>,
    #[serde(default)]
    pub before_hooks: IndexMap<String, Vec<String>>,
    #[serde(default)]
    pub before_validation_hooks: IndexMap<String, Vec<String>>,
    #[serde(default)]
    pub after_hooks: IndexMap<String, Vec<String>>,
    /// Llamadas a `log` hechas al nivel superior del archivo.
    #[serde(default, skip_serializing)]
    pub logs: Vec<SandboxLog>,
}

#[derive(Deserialize)]
struct Collected {
    hooks: CollectedHooks,
    #[serde(default)]
    logs: Vec<SandboxLog>,
}

impl CollectedHooks {
    /// Concatena `other` detrás de `self`, fase por fase y nombre por nombre.
    pub fn merge(&mut self, other: CollectedHooks) {
        self.before_all_hooks.extend(other.before_all_hooks);
        self.after_all_hooks.extend(other.after_all_hooks);
        self.before_each_hooks.extend(other.before_each_hooks);
        self.before_each_validation_hooks.extend(other.before_each_validation_hooks);
        self.after_each_hooks.extend(other.after_each_hooks);
        merge_named(&mut self.before_hooks, other.before_hooks);
        merge_named(&mut self.before_validation_hooks, other.before_validation_hooks);
        merge_named(&mut self.after_hooks, other.after_hooks);
        self.logs.extend(other.logs);
    }

    pub fn is_empty(&self) -> bool {
        self.before_all_hooks.is_empty()
        && self.after_all_hooks.is_empty()
        && self.before_each_hooks.is_empty()
        && self.before_each_validation_hooks.is_empty()
        && self.after_each_hooks.is_empty()
        && self.before_hooks.is_empty()
        && self.before_validation_hooks.is_empty()
        && self.after_hooks.is_empty()
    }
}

fn merge_named(into: &mut IndexMap<String, Vec<String>>, from: IndexMap<String, Vec<String>>) {
    for (name, sources) in from {
        into.entry(name).or_default().extend(sources);
    }
}

impl SandboxEvaluator {
    /// Evalúa un archivo de hooks y devuelve las funciones que registró.
    pub fn collect_hooks(&self, file_source: &str) -> Result<CollectedHooks, SandboxError> {
        let script = format!("{PRELUDE}\n{REGISTRATION}\n{file_source}\n;JSON.stringify({{ hooks: __hooks, logs: __logs }});");
        let output = self.run_script(&[], &script)?;
        let Collected { mut hooks, logs } = serde_json::from_str(&output)?;
        hooks.logs = logs;
        debug!("sandbox:collect done before={} after={} before_all={} after_all={}",
               hooks.before_hooks.len(),
               hooks.after_hooks.len(),
               hooks.before_all_hooks.len(),
               hooks.after_all_hooks.len());
        Ok(hooks)
    }
}
