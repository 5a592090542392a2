//! # Configuration Management Module
//!
//! Typed TOML configuration for the sync client, with defaults for every
//! section and validation on load.
//!
//! ## Configuration Structure
//!
//! - [`ControllerConfig`] - where the controller's REST API lives
//! - [`SyncSettings`] - polling cadence and optional fetches
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use meshmap::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("meshmap.toml").await?;
//!     println!("Controller: {}", config.controller.api_root());
//!     println!("Poll every {:?}", config.sync.poll_interval());
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [controller]
//! base_url = "http://localhost:4040"
//! api_path = "/api/v1"
//! timeout_seconds = 5
//!
//! [sync]
//! poll_interval_ms = 2500
//! fetch_neighbors = true
//!
//! [logging]
//! level = "info"
//! file = "meshmap.log"
//! ```
//!
//! Only `[controller].base_url` is required; everything else falls back to
//! the defaults shown above.

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::fs;

/// Lower bound for the poll interval. Anything faster floods the controller,
/// which serializes requests onto the radio link.
pub const MIN_POLL_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub controller: ControllerConfig,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Scheme, host and port of the controller, e.g. `http://localhost:4040`.
    pub base_url: String,
    #[serde(default = "default_api_path")]
    pub api_path: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u32,
}

fn default_api_path() -> String {
    "/api/v1".to_string()
}

fn default_timeout_seconds() -> u32 {
    5
}

impl ControllerConfig {
    /// `base_url` and `api_path` joined with exactly one slash.
    pub fn api_root(&self) -> String {
        let base = self.base_url.trim().trim_end_matches('/');
        let path = self.api_path.trim().trim_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", base, path)
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4040".to_string(),
            api_path: default_api_path(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Refresh the per-probe neighbor list alongside the inventories.
    #[serde(default = "default_fetch_neighbors")]
    pub fetch_neighbors: bool,
}

fn default_poll_interval_ms() -> u64 {
    2500
}

fn default_fetch_neighbors() -> bool {
    true
}

impl SyncSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            fetch_neighbors: default_fetch_neighbors(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    /// Parsed level; unrecognised values fall back to `info`.
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            controller: ControllerConfig::default(),
            sync: SyncSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config = Self::from_toml(&content)
            .map_err(|e| anyhow!("Failed to load config file {}: {}", path, e))?;

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let base = self.controller.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            bail!(
                "controller.base_url must start with http:// or https:// (got '{}')",
                self.controller.base_url
            );
        }
        if self.controller.timeout_seconds == 0 {
            bail!("controller.timeout_seconds must be at least 1");
        }
        if self.sync.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            bail!(
                "sync.poll_interval_ms must be at least {} (got {})",
                MIN_POLL_INTERVAL_MS,
                self.sync.poll_interval_ms
            );
        }
        Ok(())
    }
}
