//! Configuration management for the anime catalog explorer.
//!
//! This module handles loading and parsing configuration from TOML files,
//! with sensible defaults for all settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory settings
    pub data: DataConfig,

    /// Durable storage settings
    pub storage: StorageConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Jikan API settings
    pub api: ApiConfig,

    /// Query cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Browse view settings
    #[serde(default)]
    pub view: ViewConfig,
}

/// Data directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root data directory path
    pub root_dir: String,
}

/// Durable storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage database path (relative to data directory or absolute)
    pub path: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log directory path (relative to data directory or absolute)
    pub log_dir: String,

    /// Default log level (trace, debug, info, warn, error)
    pub default_level: String,

    /// Enable console output
    pub console: bool,

    /// Enable file output
    pub file: bool,

    /// Enable JSON formatting for file logs
    pub json_format: bool,
}

/// Jikan API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Jikan API base URL
    pub base_url: String,

    /// Minimum spacing between two outbound requests, in milliseconds
    pub min_request_interval_ms: u64,

    /// Optional rolling per-minute cap on top of the spacing
    #[serde(default)]
    pub requests_per_minute: Option<u32>,

    /// Transport timeout in seconds
    pub timeout_secs: u64,

    /// Items requested per list page
    pub page_limit: u32,

    /// User agent sent with every request
    pub user_agent: String,
}

/// Query cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Freshness window for list queries in seconds
    pub list_stale_secs: u64,

    /// Freshness window for detail and sub-resource queries in seconds
    pub detail_stale_secs: u64,

    /// Entries untouched for this long are dropped by garbage collection
    pub gc_secs: u64,
}

/// Browse view configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Debounce applied to search text before it reaches a query
    pub search_debounce_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            list_stale_secs: 5 * 60,
            detail_stale_secs: 10 * 60,
            gc_secs: 30 * 60,
        }
    }
}

impl CacheConfig {
    pub fn list_stale_time(&self) -> Duration {
        Duration::from_secs(self.list_stale_secs)
    }

    pub fn detail_stale_time(&self) -> Duration {
        Duration::from_secs(self.detail_stale_secs)
    }

    pub fn gc_time(&self) -> Duration {
        Duration::from_secs(self.gc_secs)
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            search_debounce_ms: 250,
        }
    }
}

impl ViewConfig {
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

impl ApiConfig {
    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig {
                root_dir: "data".to_string(),
            },
            storage: StorageConfig {
                path: "explorer.db".to_string(),
            },
            logging: LoggingConfig {
                log_dir: "logs".to_string(),
                default_level: "info".to_string(),
                console: true,
                file: true,
                json_format: false,
            },
            api: ApiConfig {
                base_url: "https://api.jikan.moe/v4".to_string(),
                min_request_interval_ms: 1000,
                requests_per_minute: None,
                timeout_secs: 30,
                page_limit: 25,
                user_agent: "anime-explorer/0.1.0".to_string(),
            },
            cache: CacheConfig::default(),
            view: ViewConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// If the file doesn't exist, returns the default configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Load configuration from a TOML file or fall back to defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::from_file(path).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load config, using defaults");
            Self::default()
        })
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration saved successfully"
        );

        Ok(())
    }

    /// Get the path for the data directory
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data.root_dir)
    }

    /// Get the absolute path for the storage database
    pub fn database_path(&self) -> PathBuf {
        self.resolve(&self.storage.path)
    }

    /// Get the absolute path for the log directory
    pub fn log_dir(&self) -> PathBuf {
        self.resolve(&self.logging.log_dir)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir().join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.data.root_dir, "data");
        assert_eq!(config.storage.path, "explorer.db");
        assert_eq!(config.api.min_request_interval(), Duration::from_secs(1));
        assert_eq!(config.api.requests_per_minute, None);
        assert_eq!(config.cache.list_stale_time(), Duration::from_secs(300));
        assert_eq!(config.cache.detail_stale_time(), Duration::from_secs(600));
        assert_eq!(config.view.search_debounce(), Duration::from_millis(250));
    }

    #[test]
    fn test_save_and_load_config() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.toml");

        let mut original_config = Config::default();
        original_config.api.requests_per_minute = Some(60);
        original_config.save(&config_path)?;

        assert!(config_path.exists());

        let loaded_config = Config::from_file(&config_path)?;
        assert_eq!(loaded_config.data.root_dir, original_config.data.root_dir);
        assert_eq!(loaded_config.api.base_url, original_config.api.base_url);
        assert_eq!(loaded_config.api.requests_per_minute, Some(60));

        Ok(())
    }

    #[test]
    fn test_missing_sections_use_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.toml");

        let mut config = Config::default();
        config.cache.list_stale_secs = 42;
        let mut text = toml::to_string_pretty(&config)?;
        // Drop the optional sections entirely
        text = text
            .split("\n[cache]")
            .next()
            .unwrap_or_default()
            .to_string();
        std::fs::write(&config_path, text)?;

        let loaded = Config::from_file(&config_path)?;
        assert_eq!(loaded.cache.list_stale_secs, 300);
        assert_eq!(loaded.view.search_debounce_ms, 250);

        Ok(())
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.data.root_dir, "data");
    }

    #[test]
    fn test_path_resolution() {
        let config = Config::default();

        assert!(config.database_path().ends_with("data/explorer.db"));
        assert!(config.log_dir().ends_with("data/logs"));
    }
}
