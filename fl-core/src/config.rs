//! Application configuration management.
//!
//! Handles loading, saving, and accessing the application configuration:
//! database location and pool settings, logging, compression defaults, and
//! export formatting. Configuration is persisted as TOML on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use serde::{Deserialize, Serialize};

use crate::constants::compression as defaults;
use crate::error::{FlError, FlResult};
use crate::paths;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Photo compression defaults.
    #[serde(default)]
    pub compression: CompressionConfig,

    /// Export document settings.
    #[serde(default)]
    pub export: ExportConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file. If empty, uses default location.
    #[serde(default)]
    pub path: String,

    /// Enable WAL (Write-Ahead Logging) mode.
    #[serde(default = "default_true")]
    pub wal_mode: bool,

    /// Maximum number of connections in the pool.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Run integrity check on startup.
    #[serde(default = "default_true")]
    pub integrity_check_on_startup: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for log files. If empty, uses default location.
    #[serde(default)]
    pub directory: String,

    /// Enable JSON structured logging output.
    #[serde(default)]
    pub json_output: bool,
}

/// Photo compression defaults applied to new records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Maximum output width in pixels.
    #[serde(default = "default_max_width")]
    pub max_width: u32,

    /// Maximum output height in pixels.
    #[serde(default = "default_max_height")]
    pub max_height: u32,

    /// Encoder quality in [0, 1].
    #[serde(default = "default_quality")]
    pub quality: f32,

    /// Output format: "jpeg", "png" or "webp".
    #[serde(default = "default_format")]
    pub format: String,

    /// Shrink uniformly instead of clamping each dimension.
    #[serde(default = "default_true")]
    pub maintain_aspect_ratio: bool,

    /// Run compression on a background worker thread when available.
    #[serde(default = "default_true")]
    pub use_background_worker: bool,
}

/// Export document settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Pretty-print export documents with two-space indentation.
    #[serde(default = "default_true")]
    pub pretty: bool,
}

// Default value functions for serde

fn default_true() -> bool {
    true
}

fn default_pool_size() -> u32 {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_width() -> u32 {
    defaults::DEFAULT_MAX_WIDTH
}

fn default_max_height() -> u32 {
    defaults::DEFAULT_MAX_HEIGHT
}

fn default_quality() -> f32 {
    defaults::DEFAULT_QUALITY
}

fn default_format() -> String {
    "jpeg".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            wal_mode: true,
            pool_size: default_pool_size(),
            integrity_check_on_startup: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
            json_output: false,
        }
    }
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_width: default_max_width(),
            max_height: default_max_height(),
            quality: default_quality(),
            format: default_format(),
            maintain_aspect_ratio: true,
            use_background_worker: true,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl AppConfig {
    /// Load configuration from the default config file path.
    pub fn load_default() -> FlResult<Self> {
        let path = Self::default_config_path()?;
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> FlResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific file path.
    pub fn save_to_file(&self, path: &Path) -> FlResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| FlError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Reject values that would make the pipelines misbehave.
    pub fn validate(&self) -> FlResult<()> {
        let c = &self.compression;
        if c.max_width == 0 || c.max_height == 0 {
            return Err(FlError::Config("compression bounds must be positive".into()));
        }
        if !(0.0..=1.0).contains(&c.quality) {
            return Err(FlError::Config(format!(
                "compression quality must be within [0, 1], got {}",
                c.quality
            )));
        }
        if !matches!(c.format.as_str(), "jpeg" | "png" | "webp") {
            return Err(FlError::Config(format!("unsupported compression format '{}'", c.format)));
        }
        if self.database.pool_size == 0 {
            return Err(FlError::Config("database pool size must be at least 1".into()));
        }
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> FlResult<PathBuf> {
        Ok(paths::config_dir()?.join("config.toml"))
    }

    /// Get the effective database path, using the configured path or the default.
    pub fn effective_db_path(&self) -> FlResult<PathBuf> {
        if self.database.path.is_empty() {
            Ok(paths::data_dir()?.join("foodlog.db"))
        } else {
            Ok(PathBuf::from(&self.database.path))
        }
    }

    /// Get the effective log directory, using the configured path or the default.
    pub fn effective_log_dir(&self) -> FlResult<PathBuf> {
        if self.logging.directory.is_empty() {
            Ok(paths::data_dir()?.join("logs"))
        } else {
            Ok(PathBuf::from(&self.logging.directory))
        }
    }
}

/// Thread-safe configuration holder for shared access across services.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<AppConfig>>,
}

impl ConfigHandle {
    /// Create a new configuration handle.
    pub fn new(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Read the configuration.
    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, AppConfig> {
        self.inner.read().await
    }

    /// Write/update the configuration.
    pub async fn write(&self) -> tokio::sync::RwLockWriteGuard<'_, AppConfig> {
        self.inner.write().await
    }

    /// Clone the current configuration out of the lock.
    pub async fn snapshot(&self) -> AppConfig {
        self.inner.read().await.clone()
    }
}
