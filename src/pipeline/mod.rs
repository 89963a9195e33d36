//! Node-graph runtime.
//!
//! A [`Config`] describes nodes and the connections between them. A
//! [`Device`] installs it, gives every node a bounded inbox and a worker
//! thread, and moves [`Record`]s along connections.
//!
//! # Architecture
//!
//! ```text
//! [BroadbandSource] ──► [SpectralFilter] ──► [SpikeDetector] ──► [StreamOut] ──► UDP
//!                                      └──► [DiskWriter]
//! UDP ──► [StreamIn] ──► [Application] ──► host tap
//! ```
//!
//! # Design
//!
//! - **Enum dispatch**: `BuiltinNode` covers the closed set of node kinds.
//! - **Stop-the-world reconfiguration**: every worker is joined before a new
//!   graph is installed.
//! - **Bounded queues**: a full inbox blocks the sender briefly and then
//!   drops, except application taps which evict their oldest record.
//! - **Shared frames**: records hold `Arc` frames, so fan-out is cheap.

pub mod device;
pub mod emitter;
pub mod error;
pub mod factory;
pub mod graph;
pub mod id;
pub mod node;
pub mod node_type;
pub mod nodes;
pub mod queue;
pub mod record;
pub mod status;

pub use device::{Device, DeviceInfo, SocketEntry};
pub use emitter::Emitter;
pub use error::{PipelineError, PipelineResult};
pub use factory::{NodeFactory, PortAllocator};
pub use graph::{Config, Connection, NodeConfig, NodeSpec};
pub use id::NodeId;
pub use node::{BuiltinNode, NodeContext, NodePlugin};
pub use node_type::NodeKind;
pub use queue::InboxPolicy;
pub use record::Record;
pub use status::{DeviceState, Status, StatusCode};
