//! Configuration loading and management
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/<app>/config.toml`
//! (~/.config/<app>/config.toml). The event store itself lives under a
//! platform-specific preferences directory resolved in [`crate::store`].

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
pub(crate) fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
pub(crate) fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
pub(crate) fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Local queue configuration
    #[serde(default)]
    pub queue: QueueConfig,

    /// Remote collector transport configuration
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Local event queue configuration
#[derive(Debug, Deserialize, Clone)]
pub struct QueueConfig {
    /// Prefix applied to every event name at track time
    #[serde(default)]
    pub prefix: String,

    /// Directory name under the platform preferences root.
    /// Defaults to the transport stream name.
    pub dir: Option<String>,

    /// Explicit store root, bypassing platform resolution.
    /// Mainly for tests and hosts with their own path policy.
    pub root: Option<PathBuf>,

    /// Queued-event count at or above which `maybe_flush` flushes
    #[serde(default = "default_flush_above_size")]
    pub flush_above_size: usize,

    /// Seconds since the last flush at or above which `maybe_flush` flushes
    #[serde(default = "default_flush_above_age_secs")]
    pub flush_above_age_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            dir: None,
            root: None,
            flush_above_size: default_flush_above_size(),
            flush_above_age_secs: default_flush_above_age_secs(),
        }
    }
}

fn default_flush_above_size() -> usize {
    100
}

fn default_flush_above_age_secs() -> u64 {
    3600
}

/// Remote collector transport configuration
///
/// When enabled, flushes deliver queued events to the collector in one
/// batch call per attempt. When disabled, flushes are silent no-ops and
/// events stay on disk.
#[derive(Debug, Deserialize, Clone)]
pub struct TransportConfig {
    /// Enable/disable remote delivery
    #[serde(default)]
    pub enabled: bool,

    /// Collector server URL (e.g., `https://collector.example.com`)
    pub server_url: Option<String>,

    /// Destination stream identifier on the collector
    pub stream: Option<String>,

    /// API key sent as a bearer token (optional)
    pub api_key: Option<String>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_transport_timeout")]
    pub timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server_url: None,
            stream: None,
            api_key: None,
            timeout_secs: default_transport_timeout(),
        }
    }
}

impl TransportConfig {
    /// Check if the transport is enabled and has enough to build a client
    pub fn is_ready(&self) -> bool {
        self.enabled && self.server_url.is_some()
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        if self.server_url.is_none() {
            return Err(Error::Config(
                "transport.server_url is required when transport is enabled".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "transport.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_transport_timeout() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration for `app` from the default path
    ///
    /// `$XDG_CONFIG_HOME/<app>/config.toml` (~/.config/<app>/config.toml)
    pub fn load(app: &str) -> Result<Self> {
        let config_path = Self::config_path(app);

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path for `app`
    pub fn config_path(app: &str) -> PathBuf {
        xdg_config_home().join(app).join("config.toml")
    }

    /// Returns the state directory path for `app` (for logs)
    ///
    /// `$XDG_STATE_HOME/<app>/` (~/.local/state/<app>/)
    pub fn state_dir(app: &str) -> PathBuf {
        xdg_state_home().join(app)
    }

    /// Directory name for the event store root: explicit `queue.dir`,
    /// else the transport stream name.
    pub fn store_dir_name(&self) -> Option<&str> {
        self.queue
            .dir
            .as_deref()
            .or(self.transport.stream.as_deref())
    }
}
