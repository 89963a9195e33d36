//! # synapse-dataplane: data plane for neural-interface devices
//!
//! Moves electrophysiology data between a device and its clients: a compact
//! binary wire codec (NDTP), a node-graph runtime that processes the data on
//! the device, UDP transport with link-quality monitoring, and a clock sync
//! protocol so clients can put device timestamps on their own clock.
//!
//! ## Architecture
//!
//! - **ndtp**: message codec, bit packing, and a resynchronizing depacketizer
//! - **pipeline**: graph descriptions, nodes, and the `Device` that runs them
//! - **transport**: sockets, `StreamReader`/`StreamWriter`, packet monitor
//! - **clock**: time sync client and server
//!
//! ## Configuration
//!
//! Runtime settings live in a TOML file under the platform config directory:
//!
//! - **Linux**: `~/.config/synapse-dataplane/config.toml`
//! - **macOS**: `~/Library/Application Support/synapse-dataplane/config.toml`
//! - **Windows**: `%APPDATA%\synapse-dataplane\config.toml`
//!
//! ## Example
//!
//! ```no_run
//! use synapse_dataplane::config::DataPlaneConfig;
//! use synapse_dataplane::pipeline::nodes::{ApplicationConfig, SpikeSourceConfig};
//! use synapse_dataplane::pipeline::{Config, Device};
//!
//! let settings = DataPlaneConfig::default();
//! let mut graph = Config::new();
//! let source = graph.add(&SpikeSourceConfig::default()).unwrap();
//! let app = graph.add(&ApplicationConfig::default()).unwrap();
//! graph.connect(source, app).unwrap();
//!
//! let mut device = Device::from_config(&settings);
//! assert!(device.configure(graph).is_ok());
//! let tap = device.tap(app).unwrap();
//! device.start();
//! let record = tap.recv().unwrap();
//! println!("{:?} at {}", record.kind(), record.timestamp_ns());
//! device.stop();
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod ndtp;
pub mod pipeline;
pub mod transport;

// Re-export commonly used types
pub use config::DataPlaneConfig;
pub use error::{DataPlaneError, Result};
pub use ndtp::{Depacketizer, Message};
pub use pipeline::{Config, Device, Record};
