//! Sections of the runtime configuration file.
//!
//! Every field has a default, so a partial (or empty) TOML file is valid.

use super::{
    APP_ID, DEFAULT_INBOX_CAPACITY, DEFAULT_INBOX_TIMEOUT_MS, DEFAULT_LOG_FILTER,
    DEFAULT_MAX_SYNC_PACKETS, DEFAULT_MULTICAST_TTL, DEFAULT_RECEIVE_BUFFER_BYTES,
    DEFAULT_REPORT_INTERVAL_S, DEFAULT_STREAM_PORT, DEFAULT_SYNC_INTERVAL_S,
    DEFAULT_SYNC_SEND_DELAY_MS, DEFAULT_SYNC_TIMEOUT_MS, DEFAULT_TIME_SYNC_PORT,
};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

/// Device identity and node runtime settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// Name reported by `Device::info`
    pub name: String,

    /// Serial reported by `Device::info`
    pub serial: String,

    /// Graph description to configure at startup
    pub graph: Option<PathBuf>,

    /// Capacity of each node's input queue
    pub inbox_capacity: usize,

    /// How long an upstream node waits on a full queue before dropping
    pub inbox_timeout_ms: u64,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            name: "synapse-device".to_string(),
            serial: "SIM-0001".to_string(),
            graph: None,
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
            inbox_timeout_ms: DEFAULT_INBOX_TIMEOUT_MS,
        }
    }
}

impl DeviceSettings {
    pub fn inbox_timeout(&self) -> Duration {
        Duration::from_millis(self.inbox_timeout_ms)
    }
}

/// Socket defaults for transport nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Interface address stream sockets bind to and join multicast groups on
    pub iface_ip: Ipv4Addr,

    /// First port handed to stream outputs; each further instance gets the next.
    /// Zero lets the OS pick.
    pub base_port: u16,

    pub multicast_ttl: u32,

    /// Receive buffer requested for stream inputs
    pub receive_buffer_bytes: usize,

    /// Seconds between packet quality reports
    pub report_interval_s: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            iface_ip: Ipv4Addr::UNSPECIFIED,
            base_port: DEFAULT_STREAM_PORT,
            multicast_ttl: DEFAULT_MULTICAST_TTL,
            receive_buffer_bytes: DEFAULT_RECEIVE_BUFFER_BYTES,
            report_interval_s: DEFAULT_REPORT_INTERVAL_S,
        }
    }
}

impl TransportSettings {
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_s.max(1))
    }
}

/// Clock synchronization client and server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSyncSettings {
    /// Run the time-sync server alongside the device
    pub enabled: bool,

    /// Server address for clients, bind address for the server
    pub host: Ipv4Addr,
    pub port: u16,

    /// Requests per synchronization burst
    pub max_sync_packets: usize,

    /// Delay between requests in a burst
    pub send_delay_ms: u64,

    /// How long to wait for each reply
    pub timeout_ms: u64,

    /// Pause between bursts
    pub sync_interval_s: u64,
}

impl Default for TimeSyncSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            host: Ipv4Addr::LOCALHOST,
            port: DEFAULT_TIME_SYNC_PORT,
            max_sync_packets: DEFAULT_MAX_SYNC_PACKETS,
            send_delay_ms: DEFAULT_SYNC_SEND_DELAY_MS,
            timeout_ms: DEFAULT_SYNC_TIMEOUT_MS,
            sync_interval_s: DEFAULT_SYNC_INTERVAL_S,
        }
    }
}

impl TimeSyncSettings {
    pub fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_s)
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence
    pub filter: String,

    /// Directory for daily-rolling log files. Console only when unset.
    pub directory: Option<PathBuf>,

    pub file_prefix: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            directory: None,
            file_prefix: format!("{}.log", APP_ID),
        }
    }
}
