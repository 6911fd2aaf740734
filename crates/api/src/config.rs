use std::path::PathBuf;
use std::str::FromStr;

use auditflow_core::error::CoreError;
use auditflow_core::registry::ScriptRegistry;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development. A value that
/// fails to parse is logged and replaced by its default.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `127.0.0.1`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `127.0.0.1`                |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into());
        let port = env_parse("PORT", 3000);

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = env_parse("REQUEST_TIMEOUT_SECS", 30);

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
        }
    }
}

/// Default number of runs allowed in flight at once.
pub const DEFAULT_MAX_CONCURRENT_RUNS: usize = 8;

/// Where runs and results live, how workers are found, and admission limits.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Root of `runs/` and `results/`.
    pub data_dir: PathBuf,
    /// Interpreter tried before the usual Python names.
    pub python_path: Option<String>,
    /// Directory holding the payroll dispatcher (`main.py`).
    pub codes_dir: PathBuf,
    /// Directory holding the standalone execution scripts.
    pub scripts_dir: PathBuf,
    /// JSON manifest replacing the builtin catalog when set.
    pub script_manifest: Option<PathBuf>,
    pub max_concurrent_runs: usize,
    /// Whether untagged inputs get roles guessed from their file names.
    pub role_heuristics: bool,
}

impl OrchestratorConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var               | Default              |
    /// |-----------------------|----------------------|
    /// | `DATA_DIR`            | `./data/payroll`     |
    /// | `PYTHON_PATH`         | unset                |
    /// | `CODES_DIR`           | `./payroll/encrypted`|
    /// | `SCRIPTS_DIR`         | `./scripts`          |
    /// | `SCRIPT_MANIFEST`     | unset (builtin)      |
    /// | `MAX_CONCURRENT_RUNS` | `8`                  |
    /// | `ROLE_HEURISTICS`     | `true`               |
    pub fn from_env() -> Self {
        let mut max_concurrent_runs = env_parse("MAX_CONCURRENT_RUNS", DEFAULT_MAX_CONCURRENT_RUNS);
        if max_concurrent_runs == 0 {
            tracing::warn!(
                default = DEFAULT_MAX_CONCURRENT_RUNS,
                "MAX_CONCURRENT_RUNS must be positive, using default",
            );
            max_concurrent_runs = DEFAULT_MAX_CONCURRENT_RUNS;
        }

        Self {
            data_dir: env_path("DATA_DIR").unwrap_or_else(|| PathBuf::from("./data/payroll")),
            python_path: env_nonempty("PYTHON_PATH"),
            codes_dir: env_path("CODES_DIR").unwrap_or_else(|| PathBuf::from("./payroll/encrypted")),
            scripts_dir: env_path("SCRIPTS_DIR").unwrap_or_else(|| PathBuf::from("./scripts")),
            script_manifest: env_path("SCRIPT_MANIFEST"),
            max_concurrent_runs,
            role_heuristics: env_flag("ROLE_HEURISTICS", true),
        }
    }

    /// Config rooted at `data_dir` with every other setting at its default.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            python_path: None,
            codes_dir: PathBuf::from("./payroll/encrypted"),
            scripts_dir: PathBuf::from("./scripts"),
            script_manifest: None,
            max_concurrent_runs: DEFAULT_MAX_CONCURRENT_RUNS,
            role_heuristics: true,
        }
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.data_dir.join("runs")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.data_dir.join("results")
    }

    /// Build the script registry from the manifest, or the builtin catalog.
    pub fn load_registry(&self) -> Result<ScriptRegistry, CoreError> {
        match &self.script_manifest {
            Some(manifest) => ScriptRegistry::from_manifest(manifest),
            None => Ok(ScriptRegistry::builtin(&self.codes_dir, &self.scripts_dir)),
        }
    }
}

// ---------------------------------------------------------------------------
// Env helpers
// ---------------------------------------------------------------------------

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_path(name: &str) -> Option<PathBuf> {
    env_nonempty(name).map(PathBuf::from)
}

fn env_parse<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    let Some(raw) = env_nonempty(name) else {
        return default;
    };
    raw.trim().parse().unwrap_or_else(|_| {
        tracing::warn!(var = name, value = %raw, %default, "Invalid value, using default");
        default
    })
}

fn env_flag(name: &str, default: bool) -> bool {
    match env_nonempty(name) {
        Some(raw) => parse_flag(&raw).unwrap_or_else(|| {
            tracing::warn!(var = name, value = %raw, default, "Invalid flag, using default");
            default
        }),
        None => default,
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
