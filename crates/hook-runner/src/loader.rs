//! Carga de hooks: archivos o fuentes inline, en sandbox o en un worker.
use std::path::{Path, PathBuf};

use hook_core::{Hook, HookContext, HookRegistry, RunConfig, RunLatch};
use hook_sandbox::{CollectedHooks, SandboxEvaluator};
use hook_worker::HooksWorkerClient;
use log::{debug, info};

use crate::errors::RunError;

/// Expande cada patrón relativo a `cwd`. El resultado queda ordenado por
/// nombre de archivo y sin duplicados.
pub fn resolve_hookfiles(patterns: &[String], cwd: &Path) -> Result<Vec<PathBuf>, RunError> {
    let mut files = Vec::new();
    for pattern in patterns {
        let absolute = if Path::new(pattern).is_absolute() {
            PathBuf::from(pattern)
        } else {
            cwd.join(pattern)
        };
        let absolute = absolute.to_string_lossy().into_owned();
        let matches = glob::glob(&absolute).map_err(|e| RunError::Setup(format!("Invalid hook file pattern '{pattern}': {e}")))?;
        let before = files.len();
        files.extend(matches.filter_map(Result::ok));
        if files.len() == before {
            return Err(RunError::Setup(format!("Could not find any hook file(s) on path: '{pattern}'")));
        }
    }
    files.sort_by(|a, b| (a.file_name(), a.as_path()).cmp(&(b.file_name(), b.as_path())));
    files.dedup();
    Ok(files)
}

/// Registra en `registry` los hooks que pide `config`.
///
/// Devuelve el cliente del worker cuando los hooks corren en un handler
/// externo; quien llama es responsable de detenerlo.
pub async fn load_hooks(config: &RunConfig,
                        registry: &mut HookRegistry,
                        context: &mut HookContext,
                        sandbox: &SandboxEvaluator,
                        latch: &RunLatch)
                        -> Result<Option<HooksWorkerClient>, RunError> {
    if config.hookfiles.is_empty() && config.hooks_data.is_empty() {
        debug!("no hooks to load");
        return Ok(None);
    }

    // con hookfiles presentes las fuentes inline no se consultan
    if config.hookfiles.is_empty() {
        if !config.sandbox {
            return Err(RunError::Setup("Not sandboxed hooks loading from strings is not implemented, Sandbox mode must be enabled when loading hooks from strings.".to_string()));
        }
        for (name, source) in &config.hooks_data {
            debug!("loading inline hooks '{name}' in sandbox");
            let collected = collect(sandbox, name, source.clone()).await?;
            register_collected(registry, context, collected);
        }
        registry.normalize_legacy_names();
        return Ok(None);
    }
    if !config.hooks_data.is_empty() {
        debug!("hookfiles given, ignoring {} inline hook source(s)", config.hooks_data.len());
    }

    let files = resolve_hookfiles(&config.hookfiles, &config.working_dir())?;
    info!("Found Hookfiles: {}",
          files.iter().map(|f| f.display().to_string()).collect::<Vec<_>>().join(", "));

    let worker = if config.loads_in_sandbox() {
        for file in &files {
            let source = tokio::fs::read_to_string(file).await
                                                        .map_err(|e| {
                                                            RunError::Setup(format!("Unable to read hook file '{}': {e}",
                                                                                    file.display()))
                                                        })?;
            let collected = collect(sandbox, &file.display().to_string(), source).await?;
            register_collected(registry, context, collected);
        }
        None
    } else {
        Some(HooksWorkerClient::start(config, &files, registry, latch).await?)
    };
    registry.normalize_legacy_names();
    Ok(worker)
}

async fn collect(sandbox: &SandboxEvaluator, origin: &str, source: String) -> Result<CollectedHooks, RunError> {
    let sandbox = sandbox.clone();
    tokio::task::spawn_blocking(move || sandbox.collect_hooks(&source)).await
                                                                     .map_err(|e| RunError::Setup(e.to_string()))?
                                                                     .map_err(|e| {
                                                                         RunError::Setup(format!("Unable to load hooks from '{origin}': {e}"))
                                                                     })
}

fn register_collected(registry: &mut HookRegistry, context: &mut HookContext, collected: CollectedHooks) {
    let mut loaded = HookRegistry::new();
    for source in collected.before_all_hooks {
        loaded.before_all(Hook::sandboxed(source));
    }
    for source in collected.before_each_hooks {
        loaded.before_each(Hook::sandboxed(source));
    }
    for source in collected.before_each_validation_hooks {
        loaded.before_each_validation(Hook::sandboxed(source));
    }
    for source in collected.after_each_hooks {
        loaded.after_each(Hook::sandboxed(source));
    }
    for source in collected.after_all_hooks {
        loaded.after_all(Hook::sandboxed(source));
    }
    for (name, sources) in collected.before_hooks {
        for source in sources {
            loaded.before(&name, Hook::sandboxed(source));
        }
    }
    for (name, sources) in collected.before_validation_hooks {
        for source in sources {
            loaded.before_validation(&name, Hook::sandboxed(source));
        }
    }
    for (name, sources) in collected.after_hooks {
        for source in sources {
            loaded.after(&name, Hook::sandboxed(source));
        }
    }
    for entry in collected.logs {
        context.log_at_millis(entry.timestamp, entry.content);
    }
    registry.merge(loaded);
}

#[cfg(test)]
mod tests {
    use super::*;
    use hook_core::HookPhase;
    use std::fs;

    #[test]
    fn hookfiles_are_sorted_by_basename() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("a/zeta_hooks.js"), "").unwrap();
        fs::write(dir.path().join("beta_hooks.js"), "").unwrap();
        fs::write(dir.path().join("alpha_hooks.js"), "").unwrap();

        let files = resolve_hookfiles(&["**/*_hooks.js".to_string(), "alpha_hooks.js".to_string()], dir.path()).unwrap();
        let names: Vec<String> = files.iter().map(|f| f.file_name().unwrap().to_string_lossy().into_owned()).collect();
        assert_eq!(names, vec!["alpha_hooks.js", "beta_hooks.js", "zeta_hooks.js"]);
    }

    #[test]
    fn missing_hookfile_is_a_setup_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_hookfiles(&["nope/*.js".to_string()], dir.path()).unwrap_err();
        assert_eq!(err.to_string(), "Could not find any hook file(s) on path: 'nope/*.js'");
    }

    #[tokio::test]
    async fn inline_hooks_require_sandbox() {
        let mut config = RunConfig::default();
        config.hooks_data.insert("inline".into(), "before('T', function(t){});".into());
        let err = load_hooks(&config,
                             &mut HookRegistry::new(),
                             &mut HookContext::new(),
                             &SandboxEvaluator::default(),
                             &RunLatch::new()).await
                                              .err()
                                              .unwrap();
        assert!(err.to_string().contains("Sandbox mode must be enabled when loading hooks from strings"));
    }

    #[tokio::test]
    async fn inline_hooks_are_collected_in_sandbox() {
        let mut config = RunConfig { sandbox: true, ..RunConfig::default() };
        config.hooks_data.insert("inline".into(),
                                 "log('loading'); before(' > T', function(t){ t.a = 1; }); before('T', function(t){ t.b = 2; }); afterAll(function(ts){});".into());
        let mut registry = HookRegistry::new();
        let mut context = HookContext::new();
        let worker = load_hooks(&config, &mut registry, &mut context, &SandboxEvaluator::default(), &RunLatch::new()).await
                                                                                                                  .unwrap();
        assert!(worker.is_none());
        assert_eq!(registry.hooks_for(HookPhase::Before, Some("T")).len(), 2);
        assert!(registry.hooks_for(HookPhase::Before, Some(" > T")).is_empty());
        assert_eq!(registry.hooks_for(HookPhase::AfterAll, None).len(), 1);
        assert_eq!(context.logs()[0].content, "loading");
    }

    #[tokio::test]
    async fn hookfiles_take_precedence_over_inline_sources() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hooks.js"), "after('T', function(t){ t.fromFile = true; });").unwrap();
        let mut config = RunConfig { hookfiles: vec!["*.js".into()],
                                     custom_cwd: Some(dir.path().to_path_buf()),
                                     ..RunConfig::default() };
        config.hooks_data.insert("inline".into(), "before('T', function(t){});".into());

        let mut registry = HookRegistry::new();
        let worker = load_hooks(&config,
                                &mut registry,
                                &mut HookContext::new(),
                                &SandboxEvaluator::default(),
                                &RunLatch::new()).await
                                                 .unwrap();
        assert!(worker.is_none());
        assert_eq!(registry.hooks_for(HookPhase::After, Some("T")).len(), 1);
        assert!(registry.hooks_for(HookPhase::Before, Some("T")).is_empty());
    }
}
