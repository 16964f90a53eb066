//! Application configuration management.
//!
//! Handles loading, saving, and accessing client configuration including the
//! operator-supplied backend override, development host substitution, and
//! transport timing knobs. Configuration is persisted as TOML on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{PdError, PdResult};
use crate::platform::Platform;

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Session transport settings.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Session transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Operator-supplied backend override URL. Empty means unset; when set it
    /// takes precedence over automatic environment detection.
    #[serde(default)]
    pub override_url: String,

    /// Host substituted into the same-origin rule during local development
    /// (e.g. "localhost:3001"). Empty means no substitution.
    #[serde(default)]
    pub dev_host: String,

    /// Delay before a reconnection attempt after an unexpected close.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,

    /// Interval between relay health probes.
    #[serde(default = "default_probe_interval")]
    pub relay_probe_interval_secs: u64,

    /// Consecutive failed relay probes tolerated before degrading.
    #[serde(default = "default_probe_max_failures")]
    pub relay_probe_max_failures: u32,
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

// Default value functions for serde

fn default_reconnect_delay() -> u64 {
    constants::RECONNECT_DELAY_SECS
}

fn default_probe_interval() -> u64 {
    constants::RELAY_PROBE_INTERVAL_SECS
}

fn default_probe_max_failures() -> u32 {
    constants::RELAY_PROBE_MAX_FAILURES
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            override_url: String::new(),
            dev_host: String::new(),
            reconnect_delay_secs: default_reconnect_delay(),
            relay_probe_interval_secs: default_probe_interval(),
            relay_probe_max_failures: default_probe_max_failures(),
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

impl AppConfig {
    /// Load configuration from the default config file path.
    pub fn load_default() -> PdResult<Self> {
        let path = Self::default_config_path()?;
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> PdResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a specific file path.
    pub fn save_to_file(&self, path: &Path) -> PdResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| PdError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PdResult<PathBuf> {
        let config_dir = Platform::config_dir()?;
        Ok(config_dir.join("config.toml"))
    }

    /// Get the effective log directory, using the configured path or the default.
    pub fn effective_log_dir(&self) -> PdResult<PathBuf> {
        if self.logging.directory.is_empty() {
            let data_dir = Platform::data_dir()?;
            Ok(data_dir.join("logs"))
        } else {
            Ok(PathBuf::from(&self.logging.directory))
        }
    }

    /// The effective backend override, if any.
    ///
    /// Precedence: `PLAYDECK_SERVER_URL` environment variable, then the
    /// config file value. Empty values count as unset.
    pub fn effective_override(&self) -> Option<String> {
        let from_env = std::env::var(constants::ENV_SERVER_OVERRIDE).ok();
        let raw = match from_env {
            Some(v) if !v.trim().is_empty() => v,
            _ => self.transport.override_url.clone(),
        };
        let cleaned = Self::sanitize_override_url(&raw);
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned)
        }
    }

    /// Sanitize an operator-supplied override URL.
    ///
    /// Strips whitespace and stray quotes and drops trailing slashes. Scheme
    /// normalization happens later in the address resolver.
    pub fn sanitize_override_url(raw: &str) -> String {
        let trimmed = raw.trim().trim_matches('"').trim();
        trimmed.trim_end_matches('/').to_string()
    }
}

/// Thread-safe configuration holder for shared access across components.
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
}
