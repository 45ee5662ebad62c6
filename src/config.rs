//! Configuration system using Figment.
//!
//! This module provides strongly-typed configuration loading for the server.
//! Configuration is loaded from:
//! 1. telemetry.toml file (base configuration)
//! 2. Environment variables (prefixed with TELEMETRY_DAQ_)
//!
//! Every section and field has a default, so the server starts with no
//! configuration file at all. CLI flags applied in `main` take precedence
//! over both sources.
//!
//! # Example
//! ```no_run
//! use telemetry_daq::config::TelemetryConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TelemetryConfig::load()?;
//! println!("Listening on {}:{}", config.server.listen, config.server.port);
//! # Ok(())
//! # }
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppResult, TelemetryError};
use crate::validation;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "telemetry.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TelemetryConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Ingestion server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Durable sink settings
    #[serde(default)]
    pub storage: StorageConfig,
    /// Observer-side settings
    #[serde(default)]
    pub observer: ObserverConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_app_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Ingestion server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the listener binds to
    #[serde(default = "default_listen")]
    pub listen: String,
    /// TCP port devices connect to
    #[serde(default = "default_port")]
    pub port: u16,
    /// Whether to send a `TIME <epoch_millis>` preamble line on accept
    #[serde(default)]
    pub clock_preamble: bool,
    /// Capacity of the per-device bounded time series
    #[serde(default = "default_series_capacity")]
    pub series_capacity: usize,
    /// Capacity of the best-effort notification queue
    #[serde(default = "default_notify_capacity")]
    pub notify_capacity: usize,
}

/// Durable sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory per-device CSV logs are written to
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Optional prefix prepended to every per-device file name
    #[serde(default)]
    pub file_prefix: String,
}

/// Observer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverConfig {
    /// How often the status reporter logs the device table
    #[serde(default = "default_status_interval", with = "humantime_serde")]
    pub status_interval: Duration,
}

// Default value functions
fn default_app_name() -> String {
    "telemetry-daq".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8765
}

fn default_series_capacity() -> usize {
    crate::data::MAX_SERIES_LEN
}

fn default_notify_capacity() -> usize {
    1024
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./Data")
}

fn default_status_interval() -> Duration {
    Duration::from_secs(5)
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
            clock_preamble: false,
            series_capacity: default_series_capacity(),
            notify_capacity: default_notify_capacity(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            file_prefix: String::new(),
        }
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            status_interval: default_status_interval(),
        }
    }
}

impl TelemetryConfig {
    /// Load configuration from telemetry.toml and environment variables.
    ///
    /// Environment variables can override configuration with prefix TELEMETRY_DAQ_
    /// Example: TELEMETRY_DAQ_SERVER_PORT=9000
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("TELEMETRY_DAQ_").split("_"))
            .extract()?;
        Ok(config)
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> AppResult<()> {
        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(TelemetryError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        validation::is_valid_ip(&self.server.listen)
            .map_err(|e| TelemetryError::Configuration(format!("server.listen: {e}")))?;
        validation::is_valid_port(self.server.port)
            .map_err(|e| TelemetryError::Configuration(format!("server.port: {e}")))?;
        validation::is_nonzero_capacity(self.server.series_capacity)
            .map_err(|e| TelemetryError::Configuration(format!("server.series_capacity: {e}")))?;
        validation::is_nonzero_capacity(self.server.notify_capacity)
            .map_err(|e| TelemetryError::Configuration(format!("server.notify_capacity: {e}")))?;

        let data_dir = self.storage.data_dir.to_string_lossy();
        validation::is_valid_path(&data_dir)
            .map_err(|e| TelemetryError::Configuration(format!("storage.data_dir: {e}")))?;

        if self.observer.status_interval.is_zero() {
            return Err(TelemetryError::Configuration(
                "observer.status_interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// The socket address string the listener binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.listen, self.server.port)
    }
}
