//! Clock sync datagram: 32 bytes, little-endian.
//!
//! | offset | size | field            |
//! |--------|------|------------------|
//! | 0      | 4    | client_id        |
//! | 4      | 4    | sequence         |
//! | 8      | 8    | client_send_ns   |
//! | 16     | 8    | server_receive_ns|
//! | 24     | 8    | server_send_ns   |

use crate::clock::{ClockError, ClockResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeSyncPacket {
    pub client_id: u32,
    pub sequence: u32,
    pub client_send_ns: i64,
    pub server_receive_ns: i64,
    pub server_send_ns: i64,
}

impl TimeSyncPacket {
    pub const SIZE: usize = 32;

    /// A request as sent by the client; server stamps are zero.
    pub fn request(client_id: u32, sequence: u32, client_send_ns: i64) -> Self {
        Self {
            client_id,
            sequence,
            client_send_ns,
            ..Self::default()
        }
    }

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.client_id.to_le_bytes());
        buf[4..8].copy_from_slice(&self.sequence.to_le_bytes());
        buf[8..16].copy_from_slice(&self.client_send_ns.to_le_bytes());
        buf[16..24].copy_from_slice(&self.server_receive_ns.to_le_bytes());
        buf[24..32].copy_from_slice(&self.server_send_ns.to_le_bytes());
        buf
    }

    pub fn decode(bytes: &[u8]) -> ClockResult<Self> {
        let bytes: &[u8; Self::SIZE] = bytes
            .try_into()
            .map_err(|_| ClockError::PacketSize(bytes.len()))?;
        let u32_at = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        let i64_at = |at: usize| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[at..at + 8]);
            i64::from_le_bytes(raw)
        };
        Ok(Self {
            client_id: u32_at(0),
            sequence: u32_at(4),
            client_send_ns: i64_at(8),
            server_receive_ns: i64_at(16),
            server_send_ns: i64_at(24),
        })
    }
}
