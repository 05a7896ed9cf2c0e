//! Configuración por corrida, con defaults y carga desde variables de
//! entorno (`HOOKFLOW_*`, `.env` opcional).
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use dotenvy::dotenv;
use indexmap::IndexMap;
use once_cell::sync::Lazy;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

/// Variable que activa la verificación de orden del protocolo en `afterAll`.
pub const HANDLER_ORDER_ENV: &str = "TEST_DREDD_HOOKS_HANDLER_ORDER";

/// Parámetros del cliente de workers externos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Tiempo máximo de espera de cada respuesta del handler.
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub connect_retry: Duration,
    /// Espera tras conectar antes de considerar listo al handler.
    pub after_connect_wait: Duration,
    pub term_timeout: Duration,
    pub term_retry: Duration,
    pub handler_host: String,
    pub handler_port: u16,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { timeout: Duration::from_millis(5000),
               connect_timeout: Duration::from_millis(1500),
               connect_retry: Duration::from_millis(500),
               after_connect_wait: Duration::from_millis(100),
               term_timeout: Duration::from_millis(5000),
               term_retry: Duration::from_millis(500),
               handler_host: "127.0.0.1".to_string(),
               handler_port: 61321 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// URL del servidor bajo prueba.
    pub endpoint: String,
    /// Lenguaje de los hooks: vacío/`nodejs`/`javascript` = sandbox, otro =
    /// worker externo (o comando propio).
    pub language: String,
    pub hookfiles: Vec<String>,
    /// Hooks inline: nombre → código fuente (sólo con `sandbox`).
    pub hooks_data: IndexMap<String, String>,
    pub sandbox: bool,
    pub dry_run: bool,
    pub names: bool,
    pub sorted: bool,
    pub method: Vec<String>,
    pub only: Vec<String>,
    /// Headers extra `Nombre:valor` agregados a cada request.
    pub header: Vec<String>,
    pub custom_cwd: Option<PathBuf>,
    pub sandbox_timeout: Duration,
    pub worker: WorkerConfig,
    pub test_handler_order: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { endpoint: "http://127.0.0.1:3000".to_string(),
               language: String::new(),
               hookfiles: Vec::new(),
               hooks_data: IndexMap::new(),
               sandbox: false,
               dry_run: false,
               names: false,
               sorted: false,
               method: Vec::new(),
               only: Vec::new(),
               header: Vec::new(),
               custom_cwd: None,
               sandbox_timeout: Duration::from_millis(500),
               worker: WorkerConfig::default(),
               test_handler_order: false }
    }
}

impl RunConfig {
    pub fn from_env() -> Self {
        // asegura que .env se haya cargado
        Lazy::force(&DOTENV_LOADED);
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Igual que `from_env` pero leyendo de una función arbitraria.
    pub fn from_lookup<F>(lookup: F) -> Self
        where F: Fn(&str) -> Option<String>
    {
        let defaults = Self::default();
        let text = |key: &str, default: String| lookup(key).unwrap_or(default);
        let flag = |key: &str| lookup(key).is_some_and(|v| matches!(v.trim(), "1" | "true" | "yes"));
        let list = |key: &str, sep: char| -> Vec<String> {
            lookup(key).map(|v| {
                           v.split(sep)
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(String::from)
                            .collect()
                       })
                       .unwrap_or_default()
        };
        let millis = |key: &str, default: Duration| {
            lookup(key).and_then(|v| v.trim().parse::<u64>().ok())
                       .map(Duration::from_millis)
                       .unwrap_or(default)
        };

        let worker = WorkerConfig { timeout: millis("HOOKFLOW_WORKER_TIMEOUT_MS", defaults.worker.timeout),
                                    connect_timeout: millis("HOOKFLOW_WORKER_CONNECT_TIMEOUT_MS", defaults.worker.connect_timeout),
                                    connect_retry: millis("HOOKFLOW_WORKER_CONNECT_RETRY_MS", defaults.worker.connect_retry),
                                    after_connect_wait: millis("HOOKFLOW_WORKER_AFTER_CONNECT_WAIT_MS",
                                                               defaults.worker.after_connect_wait),
                                    term_timeout: millis("HOOKFLOW_WORKER_TERM_TIMEOUT_MS", defaults.worker.term_timeout),
                                    term_retry: millis("HOOKFLOW_WORKER_TERM_RETRY_MS", defaults.worker.term_retry),
                                    handler_host: text("HOOKFLOW_WORKER_HANDLER_HOST", defaults.worker.handler_host.clone()),
                                    handler_port: lookup("HOOKFLOW_WORKER_HANDLER_PORT").and_then(|v| v.trim().parse().ok())
                                                                                        .unwrap_or(defaults.worker.handler_port) };

        Self { endpoint: text("HOOKFLOW_ENDPOINT", defaults.endpoint.clone()),
               language: text("HOOKFLOW_LANGUAGE", defaults.language.clone()),
               hookfiles: list("HOOKFLOW_HOOKFILES", ','),
               hooks_data: IndexMap::new(),
               sandbox: flag("HOOKFLOW_SANDBOX"),
               dry_run: flag("HOOKFLOW_DRY_RUN"),
               names: flag("HOOKFLOW_NAMES"),
               sorted: flag("HOOKFLOW_SORTED"),
               method: list("HOOKFLOW_METHOD", ','),
               only: list("HOOKFLOW_ONLY", ','),
               header: list("HOOKFLOW_HEADERS", '\n'),
               custom_cwd: lookup("HOOKFLOW_CWD").map(PathBuf::from),
               sandbox_timeout: millis("HOOKFLOW_SANDBOX_TIMEOUT_MS", defaults.sandbox_timeout),
               worker,
               test_handler_order: lookup(HANDLER_ORDER_ENV).is_some_and(|v| v == "true") }
    }

    /// Directorio base para resolver hookfiles.
    pub fn working_dir(&self) -> PathBuf {
        self.custom_cwd
            .clone()
            .or_else(|| env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// `true` si los hooks se cargan en el sandbox y no en un worker.
    pub fn loads_in_sandbox(&self) -> bool {
        self.sandbox || is_javascript(&self.language)
    }
}

/// Lenguajes que se ejecutan en proceso (sandbox QuickJS).
pub fn is_javascript(language: &str) -> bool {
    matches!(language.trim(), "" | "nodejs" | "javascript")
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}
