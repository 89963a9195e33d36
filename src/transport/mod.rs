//! UDP transport: socket setup, link quality monitoring, and the client-side
//! reader/writer that talk to a device's stream nodes.

pub mod monitor;
pub mod reader;
pub mod socket;
pub mod writer;

pub use monitor::{MonitorReport, PacketMonitor, SequenceSpace};
pub use reader::StreamReader;
pub use socket::{bind_receiver, bind_sender, is_timeout};
pub use writer::{SendOutcome, StreamWriter};
