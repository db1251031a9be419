//! # Configuration
//!
//! Layered settings for the audit-sweep CLI.
//!
//! Sources, later ones overriding earlier ones:
//! 1. Built-in serde defaults
//! 2. `<user config dir>/audit-sweep/config.toml`, if present
//! 3. The file named by `--config` / `AUDIT_SWEEP_CONFIG` (must exist)
//! 4. Environment variables prefixed `AUDIT_SWEEP__`, e.g.
//!    `AUDIT_SWEEP__QUERY__HARD_CAP=20000` sets `query.hard_cap`
//!
//! The bearer token is deliberately not part of this structure; it is only
//! read from `--token` / `AUDIT_SWEEP_TOKEN`.

use audit_sweep_core::{ClientConfig, DEFAULT_HARD_CAP, DEFAULT_MAX_RETENTION_DAYS, MAX_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of environment variables that override configuration values
pub const ENV_PREFIX: &str = "AUDIT_SWEEP";

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration value for '{key}': {message}")]
    Invalid { key: String, message: String },

    #[error("Missing required configuration: {key}")]
    MissingRequired { key: String },

    #[error("Failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Resolved CLI configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub endpoint: EndpointConfig,
    pub query: QueryConfig,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
}

/// Remote audit-query endpoint
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_seconds: 300,
            user_agent: format!("audit-sweep/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Query limits applied when the command line does not override them
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryConfig {
    pub page_size: usize,
    pub hard_cap: usize,
    pub max_retention_days: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            hard_cap: DEFAULT_HARD_CAP,
            max_retention_days: DEFAULT_MAX_RETENTION_DAYS,
        }
    }
}

/// Where reports are written when `--output` is not given
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExportConfig {
    pub directory: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Log format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl AppConfig {
    /// Load configuration from the standard sources
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_environment(
            explicit_path,
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
    }

    /// Load configuration with a caller-supplied environment source
    pub fn load_with_environment(
        explicit_path: Option<&Path>,
        environment: config::Environment,
    ) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(user_file) = default_config_path() {
            builder = builder.add_source(
                config::File::from(user_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        if let Some(path) = explicit_path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound {
                    path: path.to_path_buf(),
                });
            }
            builder = builder.add_source(
                config::File::from(path)
                    .required(true)
                    .format(config::FileFormat::Toml),
            );
        }

        let config: AppConfig = builder
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.query.page_size == 0 || self.query.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid {
                key: "query.page_size".to_string(),
                message: format!("must be between 1 and {}", MAX_PAGE_SIZE),
            });
        }

        if self.query.hard_cap == 0 {
            return Err(ConfigError::Invalid {
                key: "query.hard_cap".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.query.max_retention_days == 0 {
            return Err(ConfigError::Invalid {
                key: "query.max_retention_days".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.endpoint.timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                key: "endpoint.timeout_seconds".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Settings for the HTTP audit source
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::builder()
            .base_url(self.endpoint.base_url.clone())
            .user_agent(self.endpoint.user_agent.clone())
            .timeout(Duration::from_secs(self.endpoint.timeout_seconds))
            .build()
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Per-user configuration file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("audit-sweep").join("config.toml"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
