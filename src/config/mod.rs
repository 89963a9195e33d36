//! Configuration for the data plane
//!
//! The runtime configuration is a TOML file with four sections:
//!
//! ```toml
//! [device]
//! name = "synapse-device"
//! graph = "/etc/synapse/graph.json"
//!
//! [transport]
//! iface_ip = "10.40.61.1"
//! base_port = 6480
//!
//! [time_sync]
//! enabled = true
//! port = 52340
//!
//! [logging]
//! filter = "info,synapse_dataplane=debug"
//! directory = "/var/log/synapse"
//! ```
//!
//! Node graphs are separate JSON files, see [`crate::pipeline::Config`].
//!
//! # Config Location
//!
//! Without an explicit path the file is looked up in the platform config
//! directory, e.g. `~/.config/synapse-dataplane/config.toml` on Linux.

pub mod settings;

pub use settings::*;

use crate::error::{DataPlaneError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for config and log directories
pub const APP_ID: &str = "synapse-dataplane";

/// Config filename inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// First port used by stream outputs
pub const DEFAULT_STREAM_PORT: u16 = 6480;

/// Time-sync server port
pub const DEFAULT_TIME_SYNC_PORT: u16 = 52340;

pub const DEFAULT_MULTICAST_TTL: u32 = 3;

/// Receive buffer requested by stream inputs (5 MB)
pub const DEFAULT_RECEIVE_BUFFER_BYTES: usize = 5 * 1024 * 1024;

/// Largest UDP payload over IPv4
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Upper bound on how long a socket loop blocks before checking for stop
pub const SOCKET_POLL_TIMEOUT: Duration = Duration::from_secs(1);

pub const DEFAULT_INBOX_CAPACITY: usize = 1024;
pub const DEFAULT_INBOX_TIMEOUT_MS: u64 = 100;
pub const DEFAULT_REPORT_INTERVAL_S: u64 = 5;

pub const DEFAULT_MAX_SYNC_PACKETS: usize = 12;
pub const DEFAULT_SYNC_SEND_DELAY_MS: u64 = 200;
pub const DEFAULT_SYNC_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_SYNC_INTERVAL_S: u64 = 5;

/// Default `EnvFilter` directives
pub const DEFAULT_LOG_FILTER: &str = "info,synapse_dataplane=debug";

// ==================== Config Directory ====================

/// Get the platform config directory for this application
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Get the default config file path
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== Runtime Config ====================

/// Complete runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataPlaneConfig {
    pub device: DeviceSettings,
    pub transport: TransportSettings,
    pub time_sync: TimeSyncSettings,
    pub logging: LoggingSettings,
}

impl DataPlaneConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| DataPlaneError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DataPlaneError::Serialization(format!("Failed to serialize config: {}", e)))
    }

    /// Load a config file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DataPlaneError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from `path`, or the default location when `None`.
    ///
    /// A missing default file yields the defaults; an explicit path must exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load(path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Save the config to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DataPlaneError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }
        std::fs::write(path, self.to_toml_string()?).map_err(|e| {
            DataPlaneError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }
}
