//! Configuration management for Taxograph.
//!
//! Configuration is loaded from multiple sources with the following priority:
//! 1. Environment variables (highest priority)
//! 2. Project-local `taxograph.toml` file
//! 3. User config `~/.config/taxograph/config.toml`
//! 4. Built-in defaults (lowest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod defaults;

pub use defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Store configuration.
    pub database: DatabaseConfig,

    /// Log output configuration.
    pub logging: LoggingConfig,

    /// Gephi export configuration.
    pub export: ExportConfig,

    /// Viewer API configuration.
    pub serve: ServerConfig,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// Searches for config in order:
    /// 1. `./taxograph.toml` (project local)
    /// 2. `~/.config/taxograph/config.toml` (user config)
    /// 3. Falls back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None, &ConfigOverrides::default())
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load_with(Some(path.as_ref()), &ConfigOverrides::default())
    }

    /// Load from `file` (or the default locations), then apply environment
    /// and command-line overrides. Validation runs last.
    pub fn load_with(file: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let mut config: Config = match file.map(Path::to_path_buf).or_else(Self::discover) {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                toml::from_str(&content)?
            }
            None => Self::default(),
        };

        config.apply_env_overrides();
        overrides.apply(&mut config);
        config.validate()?;

        Ok(config)
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        Self::user_config_path().filter(|path| path.exists())
    }

    /// Path of the per-user config file, if the platform has a config dir.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(DEFAULT_CONFIG_DIR).join("config.toml"))
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("TAXOGRAPH_DB_PATH") {
            self.database.path = path;
        }
        if let Ok(level) = std::env::var("TAXOGRAPH_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(dir) = std::env::var("TAXOGRAPH_EXPORT_DIR") {
            self.export.dir = dir;
        }
        if let Ok(port) = std::env::var("TAXOGRAPH_SERVE_PORT") {
            if let Ok(n) = port.parse() {
                self.serve.port = n;
            }
        }
    }

    /// Reject settings no command can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::Invalid("database.path is empty".to_string()));
        }
        if self.serve.port == 0 {
            return Err(ConfigError::Invalid("serve.port must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Create a default config file content as a string.
    pub fn default_config_string() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Settings given on the command line. They win over files and the
/// environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub db_path: Option<String>,
}

impl ConfigOverrides {
    fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.db_path {
            config.database.path = path.clone();
        }
    }
}

/// Store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path of the SQLite database holding taxonomy and graph tables.
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_DB_PATH.to_string(),
        }
    }
}

/// Log output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "taxograph_core=debug".
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

/// Gephi export configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory that receives `nodes.csv` and `edges.csv`.
    pub dir: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dir: DEFAULT_EXPORT_DIR.to_string(),
        }
    }
}

impl ExportConfig {
    pub fn dir_path(&self) -> PathBuf {
        PathBuf::from(&self.dir)
    }
}

/// Viewer API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: String,

    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SERVE_HOST.to_string(),
            port: DEFAULT_SERVE_PORT,
        }
    }
}
