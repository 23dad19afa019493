//! Application configuration.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use tradecast_resolver::DEFAULT_POOL_CAPACITY;

/// Heartbeat tuning for the streaming service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatSettings {
    /// Probe interval (ms). Default: 3,000.
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,
    /// Consecutive unanswered probes before a subscriber is lost. Default: 3.
    #[serde(default = "default_loss_limit")]
    pub loss_limit: u32,
}

fn default_probe_interval_ms() -> u64 {
    3_000
}

fn default_loss_limit() -> u32 {
    3
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            probe_interval_ms: default_probe_interval_ms(),
            loss_limit: default_loss_limit(),
        }
    }
}

/// Uid resolver configuration.
///
/// With a `url` the resolver calls the remote metadata service; without
/// one it serves the static token table below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverSettings {
    /// Remote resolve endpoint. Optional.
    #[serde(default)]
    pub url: Option<String>,
    /// Static token table used when no url is configured.
    #[serde(default)]
    pub tokens: HashMap<String, u32>,
    /// Maximum concurrent resolutions. Default: 50.
    #[serde(default = "default_pool_capacity")]
    pub pool_capacity: usize,
}

fn default_pool_capacity() -> usize {
    DEFAULT_POOL_CAPACITY
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            url: None,
            tokens: HashMap::new(),
            pool_capacity: default_pool_capacity(),
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySettings {
    /// Log level used when RUST_LOG is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Ingestion endpoint address.
    #[serde(default = "default_ingest_addr")]
    pub ingest_addr: String,
    /// Stream control endpoint address.
    #[serde(default = "default_control_addr")]
    pub control_addr: String,
    /// Data (pub/sub) endpoint address.
    #[serde(default = "default_data_addr")]
    pub data_addr: String,
    /// Heartbeat configuration.
    #[serde(default)]
    pub heartbeat: HeartbeatSettings,
    /// Resolver configuration.
    #[serde(default)]
    pub resolver: ResolverSettings,
    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

fn default_ingest_addr() -> String {
    "127.0.0.1:7070".to_string()
}

fn default_control_addr() -> String {
    "127.0.0.1:7071".to_string()
}

fn default_data_addr() -> String {
    "127.0.0.1:7072".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ingest_addr: default_ingest_addr(),
            control_addr: default_control_addr(),
            data_addr: default_data_addr(),
            heartbeat: HeartbeatSettings::default(),
            resolver: ResolverSettings::default(),
            telemetry: TelemetrySettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file.
    pub fn load() -> AppResult<Self> {
        let config_path = std::env::var("TRADECAST_CONFIG")
            .unwrap_or_else(|_| "config/default.toml".to_string());

        if Path::new(&config_path).exists() {
            Self::from_file(&config_path)
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    pub fn ingest_socket_addr(&self) -> AppResult<SocketAddr> {
        parse_addr("ingest_addr", &self.ingest_addr)
    }

    pub fn control_socket_addr(&self) -> AppResult<SocketAddr> {
        parse_addr("control_addr", &self.control_addr)
    }

    pub fn data_socket_addr(&self) -> AppResult<SocketAddr> {
        parse_addr("data_addr", &self.data_addr)
    }
}

fn parse_addr(field: &str, value: &str) -> AppResult<SocketAddr> {
    value
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid {field} '{value}': {e}")))
}
