use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "Labsight";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default Ollama endpoint (local inference).
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default bind address for the HTTP service.
pub const DEFAULT_BIND: &str = "127.0.0.1:8088";

/// Per-call timeout for the extraction capability.
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;

/// Overall deadline for one interpretation (chunk fan-out + synthesis).
pub const DEFAULT_DEADLINE_SECS: u64 = 300;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "info,labsight_lib=debug"
    } else {
        "info"
    }
}

/// Get the application data directory
/// ~/Labsight/ on all platforms.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

/// Default location of the history database.
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("history.db")
}

/// Service configuration, read from `LABSIGHT_*` environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub ollama_url: String,
    /// Explicit model name. `None` = pick the best installed model at startup.
    pub model: Option<String>,
    pub bind: SocketAddr,
    pub db_path: PathBuf,
    pub llm_timeout: Duration,
    pub deadline: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            model: None,
            bind: DEFAULT_BIND.parse().unwrap_or(SocketAddr::from(([127, 0, 0, 1], 8088))),
            db_path: default_db_path(),
            llm_timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
            deadline: Duration::from_secs(DEFAULT_DEADLINE_SECS),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

impl ServiceConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup (testable).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = non_empty(lookup("LABSIGHT_OLLAMA_URL")) {
            config.ollama_url = url;
        }
        config.model = non_empty(lookup("LABSIGHT_MODEL"));

        if let Some(bind) = non_empty(lookup("LABSIGHT_BIND")) {
            config.bind = bind.parse().map_err(|_| ConfigError::InvalidValue {
                var: "LABSIGHT_BIND",
                value: bind.clone(),
            })?;
        }
        if let Some(path) = non_empty(lookup("LABSIGHT_DB_PATH")) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(secs) = non_empty(lookup("LABSIGHT_LLM_TIMEOUT_SECS")) {
            config.llm_timeout = parse_secs("LABSIGHT_LLM_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = non_empty(lookup("LABSIGHT_DEADLINE_SECS")) {
            config.deadline = parse_secs("LABSIGHT_DEADLINE_SECS", &secs)?;
        }

        Ok(config)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_secs(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: value.to_string(),
        }),
    }
}
