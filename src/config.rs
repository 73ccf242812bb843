//! Configuration loader and validator for the daily care board.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable that overrides `api.api_key` when set.
pub const API_KEY_ENV: &str = "KENNEL_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub app: App,
    pub api: Api,
    #[serde(default)]
    pub care: Care,
}

/// App-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    /// Fallback tracing filter used when `RUST_LOG` is unset.
    #[serde(default)]
    pub log_filter: Option<String>,
}

/// Hosted database endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Api {
    pub base_url: String,
    pub api_key: String,
}

/// Timing knobs for the care board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Care {
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
    #[serde(default = "default_cell_debounce_ms")]
    pub cell_debounce_ms: u64,
    #[serde(default = "default_action_debounce_ms")]
    pub action_debounce_ms: u64,
}

fn default_cache_ttl_ms() -> u64 {
    20_000
}

fn default_cell_debounce_ms() -> u64 {
    300
}

fn default_action_debounce_ms() -> u64 {
    1_000
}

impl Default for Care {
    fn default() -> Self {
        Self {
            cache_ttl_ms: default_cache_ttl_ms(),
            cell_debounce_ms: default_cell_debounce_ms(),
            action_debounce_ms: default_action_debounce_ms(),
        }
    }
}

impl Care {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn cell_debounce(&self) -> Duration {
        Duration::from_millis(self.cell_debounce_ms)
    }

    pub fn action_debounce(&self) -> Duration {
        Duration::from_millis(self.action_debounce_ms)
    }
}

impl Config {
    /// Replace the API key with `KENNEL_API_KEY` when that variable is set and non-empty.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.api.api_key = key;
            }
        }
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
/// - Environment overrides are applied before validation.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let mut cfg: Config = serde_yaml::from_str(&content)?;
    cfg.apply_env_overrides();
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    let base = cfg.api.base_url.trim();
    if base.is_empty() {
        return Err(ConfigError::Invalid("api.base_url must be non-empty"));
    }
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(ConfigError::Invalid("api.base_url must be an http(s) URL"));
    }
    if cfg.api.api_key.trim().is_empty() {
        return Err(ConfigError::Invalid("api.api_key must be non-empty"));
    }

    // A zero TTL is allowed: it disables the refresh cache.
    if cfg.care.cell_debounce_ms == 0 {
        return Err(ConfigError::Invalid("care.cell_debounce_ms must be > 0"));
    }
    if cfg.care.action_debounce_ms == 0 {
        return Err(ConfigError::Invalid("care.action_debounce_ms must be > 0"));
    }

    Ok(())
}

/// Returns the example YAML content shipped with the project.
pub fn example() -> &'static str {
    r#"app:
  log_filter: "info,kennel_care=debug"

api:
  base_url: "https://kennel.example.supabase.co/"
  api_key: "YOUR_SERVICE_API_KEY"

care:
  cache_ttl_ms: 20000
  cell_debounce_ms: 300
  action_debounce_ms: 1000
"#
}
