//! Clock synchronization between a client and a device.
//!
//! The client sends a burst of stamped requests, the server stamps receive
//! and send times and echoes them back, and the client keeps the offset from
//! the sample with the smallest round trip.
//!
//! ```text
//!  client                     server
//!  t1 = client_send  ───────►  t2 = server_receive
//!  t4 = client_recv  ◄───────  t3 = server_send
//!
//!  offset = ((t2 - t1) + (t3 - t4)) / 2
//!  rtt    = (t4 - t1) - (t3 - t2)
//! ```

pub mod client;
pub mod estimate;
pub mod packet;
pub mod server;

pub use client::{TimeSyncClient, TimeSyncHandle};
pub use estimate::{ClockEstimator, SyncSample};
pub use packet::TimeSyncPacket;
pub use server::TimeSyncServer;

use chrono::Utc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClockError {
    #[error("Clock sync I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Clock sync packet is {0} bytes, expected 32")]
    PacketSize(usize),

    #[error("No clock sync replies received from {0}")]
    NoReplies(std::net::SocketAddr),
}

pub type ClockResult<T> = std::result::Result<T, ClockError>;

/// Wall clock in nanoseconds since the Unix epoch.
pub fn system_time_ns() -> i64 {
    let now = Utc::now();
    now.timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1_000))
}
