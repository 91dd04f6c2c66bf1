//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub index: IndexSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Spatial index configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IndexSettings {
    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default = "default_bits")]
    pub bits: u32,

    #[serde(default = "default_z_discriminator")]
    pub z_discriminator: String,

    #[serde(default = "default_key_discriminator")]
    pub key_discriminator: String,

    #[serde(default = "default_scan_batch_size")]
    pub scan_batch_size: usize,
}

fn default_prefix() -> String {
    "s_index".to_string()
}

fn default_bits() -> u32 {
    32
}

fn default_z_discriminator() -> String {
    "Z".to_string()
}

fn default_key_discriminator() -> String {
    "K".to_string()
}

fn default_scan_batch_size() -> usize {
    256
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            bits: default_bits(),
            z_discriminator: default_z_discriminator(),
            key_discriminator: default_key_discriminator(),
            scan_batch_size: default_scan_batch_size(),
        }
    }
}

/// Which ordered key-value store backs the index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sqlite,
    Memory,
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Backend::Sqlite),
            "memory" => Ok(Backend::Memory),
            other => Err(format!("unknown backend: {}", other)),
        }
    }
}

/// Storage backend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: Backend,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("zspatial").to_string_lossy().to_string())
        .unwrap_or_else(|| "./zspatial_data".to_string())
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            data_dir: default_data_dir(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("zspatial").join("config.toml")),
            Some(PathBuf::from("/etc/zspatial/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Storage overrides
        if let Some(data_dir) = var("ZSPATIAL_DATA_DIR") {
            self.storage.data_dir = data_dir;
        }
        if let Some(backend) = var("ZSPATIAL_BACKEND") {
            match backend.parse() {
                Ok(b) => self.storage.backend = b,
                Err(e) => tracing::warn!("Ignoring ZSPATIAL_BACKEND: {}", e),
            }
        }

        // Index overrides
        if let Some(prefix) = var("ZSPATIAL_PREFIX") {
            self.index.prefix = prefix;
        }
        if let Some(bits) = var("ZSPATIAL_BITS") {
            match bits.parse() {
                Ok(b) => self.index.bits = b,
                Err(e) => tracing::warn!("Ignoring ZSPATIAL_BITS={:?}: {}", bits, e),
            }
        }

        // Logging overrides
        if let Some(level) = var("ZSPATIAL_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("ZSPATIAL_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# zspatial Configuration
#
# Environment variables override these settings:
# - ZSPATIAL_DATA_DIR
# - ZSPATIAL_BACKEND
# - ZSPATIAL_PREFIX
# - ZSPATIAL_BITS
# - ZSPATIAL_LOG_LEVEL
# - ZSPATIAL_LOG_FORMAT

[index]
# Namespace prefix for every key the index writes
prefix = "s_index"

# Coordinate bit-width: x and y must be below 2^bits (1..=32)
bits = 32

# Single bytes tagging the two mappings
z_discriminator = "Z"
key_discriminator = "K"

# Entries fetched per range scan
scan_batch_size = 256

[storage]
# Backend: sqlite (durable) or memory (lost on exit)
backend = "sqlite"

# Directory for the SQLite database (default: <local data dir>/zspatial)
# data_dir = "/var/lib/zspatial"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
