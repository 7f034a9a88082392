//! Configuration types for the telemetry endpoint.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::TelemetryError;
use crate::store::StoreConfig;

/// Default listen port, matching the upstream emulator.
pub const DEFAULT_PORT: u16 = 5000;

/// Default maximum request body size (50 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Default store directory.
pub const DEFAULT_STORE_PATH: &str = "./telemetry-store";

/// Default log sync interval (sync every write).
pub const DEFAULT_SYNC_INTERVAL: u64 = 1;

/// Default per-subscriber stream buffer (messages).
pub const DEFAULT_STREAM_BUFFER: usize = 256;

/// Telemetry endpoint configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Server configuration.
    pub server: ServerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Live stream configuration.
    pub stream: StreamConfig,
}

impl ServiceConfig {
    /// Load configuration from files and environment.
    ///
    /// Configuration is loaded in order (later sources override earlier):
    /// 1. Default values
    /// 2. `beacon.toml` in the current directory
    /// 3. Environment variables prefixed with `BEACON_`
    pub fn load() -> Result<Self, TelemetryError> {
        Figment::new()
            .merge(Toml::file("beacon.toml"))
            .merge(Env::prefixed("BEACON_").split("_"))
            .extract()
            .map_err(|e| TelemetryError::Config(e.to_string()))
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &str) -> Result<Self, TelemetryError> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("BEACON_").split("_"))
            .extract()
            .map_err(|e| TelemetryError::Config(e.to_string()))
    }
}

/// Server address configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (default: 0.0.0.0:5000).
    pub listen_addr: SocketAddr,
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Store directory.
    pub path: PathBuf,
    /// Sync the log to disk every N writes.
    pub sync_interval: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORE_PATH),
            sync_interval: DEFAULT_SYNC_INTERVAL,
        }
    }
}

impl StorageConfig {
    /// Build the store's own configuration.
    pub fn to_store_config(&self) -> StoreConfig {
        StoreConfig {
            path: self.path.clone(),
            create_if_missing: true,
            sync_interval: self.sync_interval,
        }
    }
}

/// Live stream configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Per-subscriber channel capacity before the subscriber is dropped.
    pub buffer_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_STREAM_BUFFER,
        }
    }
}
