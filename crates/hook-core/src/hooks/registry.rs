//! `HookRegistry`: ocho listas ordenadas de hooks.
//!
//! Tres fases se indexan además por nombre de transacción (`before`,
//! `beforeValidation`, `after`). El orden de registro es el orden de
//! ejecución.
use indexmap::IndexMap;
use log::debug;

use super::hook::Hook;
use super::phase::HookPhase;
use crate::errors::CoreError;

#[derive(Debug, Clone, Default)]
pub struct HookRegistry {
    before_all: Vec<Hook>,
    after_all: Vec<Hook>,
    before_each: Vec<Hook>,
    before_each_validation: Vec<Hook>,
    after_each: Vec<Hook>,
    before: IndexMap<String, Vec<Hook>>,
    before_validation: IndexMap<String, Vec<Hook>>,
    after: IndexMap<String, Vec<Hook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registro genérico. Las fases por nombre exigen `name`; el resto lo
    /// rechaza.
    pub fn add(&mut self, phase: HookPhase, name: Option<&str>, hook: Hook) -> Result<&mut Self, CoreError> {
        match (phase.is_named(), name) {
            (true, Some(name)) => self.named_mut(phase)
                                      .entry(name.to_string())
                                      .or_default()
                                      .push(hook),
            (false, None) => self.list_mut(phase).push(hook),
            (true, None) => return Err(CoreError::Config(format!("'{phase}' hooks need a transaction name"))),
            (false, Some(name)) => {
                return Err(CoreError::Config(format!("'{phase}' hooks do not take a transaction name (got '{name}')")))
            }
        }
        Ok(self)
    }

    pub fn before(&mut self, name: &str, hook: Hook) -> &mut Self {
        self.before.entry(name.to_string()).or_default().push(hook);
        self
    }

    pub fn before_validation(&mut self, name: &str, hook: Hook) -> &mut Self {
        self.before_validation.entry(name.to_string()).or_default().push(hook);
        self
    }

    pub fn after(&mut self, name: &str, hook: Hook) -> &mut Self {
        self.after.entry(name.to_string()).or_default().push(hook);
        self
    }

    pub fn before_all(&mut self, hook: Hook) -> &mut Self {
        self.before_all.push(hook);
        self
    }

    pub fn after_all(&mut self, hook: Hook) -> &mut Self {
        self.after_all.push(hook);
        self
    }

    pub fn before_each(&mut self, hook: Hook) -> &mut Self {
        self.before_each.push(hook);
        self
    }

    pub fn before_each_validation(&mut self, hook: Hook) -> &mut Self {
        self.before_each_validation.push(hook);
        self
    }

    pub fn after_each(&mut self, hook: Hook) -> &mut Self {
        self.after_each.push(hook);
        self
    }

    /// Hooks de `phase` en orden de registro. Para fases por nombre se
    /// busca `name`; sin coincidencia la lista es vacía.
    pub fn hooks_for(&self, phase: HookPhase, name: Option<&str>) -> &[Hook] {
        if phase.is_named() {
            return name.and_then(|n| self.named(phase).get(n))
                       .map(Vec::as_slice)
                       .unwrap_or(&[]);
        }
        match phase {
            HookPhase::BeforeAll => &self.before_all,
            HookPhase::AfterAll => &self.after_all,
            HookPhase::BeforeEach => &self.before_each,
            HookPhase::BeforeEachValidation => &self.before_each_validation,
            _ => &self.after_each,
        }
    }

    /// Nombres de transacción con hooks para una fase por nombre.
    pub fn names(&self, phase: HookPhase) -> Vec<&str> {
        if !phase.is_named() {
            return Vec::new();
        }
        self.named(phase).keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        let lists = self.before_all.len()
                    + self.after_all.len()
                    + self.before_each.len()
                    + self.before_each_validation.len()
                    + self.after_each.len();
        let named: usize = [&self.before, &self.before_validation, &self.after].iter()
                                                                                .flat_map(|m| m.values())
                                                                                .map(Vec::len)
                                                                                .sum();
        lists + named
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Agrega al final todos los hooks de `other`, fase por fase.
    pub fn merge(&mut self, other: HookRegistry) {
        self.before_all.extend(other.before_all);
        self.after_all.extend(other.after_all);
        self.before_each.extend(other.before_each);
        self.before_each_validation.extend(other.before_each_validation);
        self.after_each.extend(other.after_each);
        for (into, from) in [(&mut self.before, other.before),
                             (&mut self.before_validation, other.before_validation),
                             (&mut self.after, other.after)]
        {
            for (name, hooks) in from {
                into.entry(name).or_default().extend(hooks);
            }
        }
    }

    /// Funde los nombres legados (`" > Nombre"`) en su clave canónica.
    ///
    /// Los hooks del nombre legado van primero, seguidos de los que ya
    /// estaban bajo la clave canónica.
    pub fn normalize_legacy_names(&mut self) {
        for map in [&mut self.before, &mut self.before_validation, &mut self.after] {
            let legacy: Vec<String> = map.keys().filter(|k| canonical_name(k).is_some()).cloned().collect();
            for name in legacy {
                let Some(hooks) = map.shift_remove(&name) else { continue };
                let canonical = canonical_name(&name).unwrap_or(&name).to_string();
                debug!("registry:normalize legacy='{name}' canonical='{canonical}'");
                let existing = map.shift_remove(&canonical).unwrap_or_default();
                let mut merged = hooks;
                merged.extend(existing);
                map.insert(canonical, merged);
            }
        }
    }

    fn named(&self, phase: HookPhase) -> &IndexMap<String, Vec<Hook>> {
        match phase {
            HookPhase::Before => &self.before,
            HookPhase::BeforeValidation => &self.before_validation,
            _ => &self.after,
        }
    }

    fn named_mut(&mut self, phase: HookPhase) -> &mut IndexMap<String, Vec<Hook>> {
        match phase {
            HookPhase::Before => &mut self.before,
            HookPhase::BeforeValidation => &mut self.before_validation,
            _ => &mut self.after,
        }
    }

    fn list_mut(&mut self, phase: HookPhase) -> &mut Vec<Hook> {
        match phase {
            HookPhase::BeforeAll => &mut self.before_all,
            HookPhase::AfterAll => &mut self.after_all,
            HookPhase::BeforeEach => &mut self.before_each,
            HookPhase::BeforeEachValidation => &mut self.before_each_validation,
            _ => &mut self.after_each,
        }
    }
}

/// `" > Nombre"` → `"Nombre"`: un espacio, `>`, un espacio al inicio.
fn canonical_name(name: &str) -> Option<&str> {
    let mut chars = name.char_indices();
    let (_, first) = chars.next()?;
    let (_, second) = chars.next()?;
    let (index, third) = chars.next()?;
    (first.is_whitespace() && second == '>' && third.is_whitespace()).then(|| &name[index + third.len_utf8()..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources(hooks: &[Hook]) -> Vec<String> {
        hooks.iter()
             .map(|h| match h {
                 Hook::Sandboxed(src) => src.clone(),
                 Hook::Native(_) => "<native>".to_string(),
             })
             .collect()
    }

    #[test]
    fn canonical_name_strips_only_the_legacy_separator() {
        assert_eq!(canonical_name(" > Machines > Get"), Some("Machines > Get"));
        assert_eq!(canonical_name("Machines > Get"), None);
        assert_eq!(canonical_name(">> x"), None);
        assert_eq!(canonical_name(" >"), None);
    }

    #[test]
    fn legacy_hooks_are_merged_before_canonical_ones() {
        let mut registry = HookRegistry::new();
        registry.before("Get", Hook::sandboxed("canonical"));
        registry.before(" > Get", Hook::sandboxed("legacy"));
        registry.after(" > Post", Hook::sandboxed("only-legacy"));
        registry.normalize_legacy_names();

        assert_eq!(sources(registry.hooks_for(HookPhase::Before, Some("Get"))), vec!["legacy", "canonical"]);
        assert_eq!(sources(registry.hooks_for(HookPhase::After, Some("Post"))), vec!["only-legacy"]);
        assert!(registry.hooks_for(HookPhase::Before, Some(" > Get")).is_empty());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn add_checks_name_against_phase() {
        let mut registry = HookRegistry::new();
        assert!(registry.add(HookPhase::Before, None, Hook::sandboxed("x")).is_err());
        assert!(registry.add(HookPhase::AfterEach, Some("T"), Hook::sandboxed("x")).is_err());
        registry.add(HookPhase::BeforeValidation, Some("T"), Hook::sandboxed("a")).unwrap();
        registry.add(HookPhase::AfterAll, None, Hook::sandboxed("b")).unwrap();
        assert_eq!(registry.names(HookPhase::BeforeValidation), vec!["T"]);
        assert_eq!(registry.hooks_for(HookPhase::AfterAll, None).len(), 1);
    }

    #[test]
    fn merge_appends_in_order() {
        let mut a = HookRegistry::new();
        a.before_each(Hook::sandboxed("1")).before("T", Hook::sandboxed("a1"));
        let mut b = HookRegistry::new();
        b.before_each(Hook::sandboxed("2")).before("T", Hook::sandboxed("b1"));
        a.merge(b);
        assert_eq!(sources(a.hooks_for(HookPhase::BeforeEach, None)), vec!["1", "2"]);
        assert_eq!(sources(a.hooks_for(HookPhase::Before, Some("T"))), vec!["a1", "b1"]);
    }
}
