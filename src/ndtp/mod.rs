//! NDTP wire codec.
//!
//! Frame layout (integers little-endian, sample data MSB-first bit-packed):
//!
//! ```text
//! +-------+------+-----------+----------+---------------+--------------+------+--------+
//! | magic | kind | timestamp | sequence | channel_count | custom field | body | crc32  |
//! | u32   | u8   | i64       | u16      | u16           | 7 or 2 bytes | ...  | u32    |
//! +-------+------+-----------+----------+---------------+--------------+------+--------+
//! ```
//!
//! - Broadband custom field: `flags u8 (bit_width << 1 | is_signed)`,
//!   `sample_rate_hz u32`, `samples_per_channel u16`. Body: per channel a
//!   `channel_id u32` followed by the packed samples.
//! - Spiketrain custom field: `bin_size_ms u16`. Body: 2-bit packed counts.
//! - The CRC-32 covers every byte before it.

pub mod bits;
pub mod depacketizer;
pub mod error;
pub mod frame;
pub mod header;
pub mod message;
pub mod payload;

pub use bits::{pack, pack_signed, packed_len, unpack, unpack_signed};
pub use depacketizer::{Depacketizer, DepacketizerStats, ParseState};
pub use error::{NdtpError, NdtpResult};
pub use frame::{BroadbandFrame, Frame, SpiketrainFrame};
pub use header::{DataKind, Header};
pub use message::{checksum, Message};
pub use payload::{BroadbandPayload, ChannelSamples, Payload, SpiketrainPayload};

pub const NDTP_MAGIC: u32 = 0xC0FF_EE00;

pub const CHANNEL_COUNT_SIZE: usize = 2;
pub const BROADBAND_CUSTOM_SIZE: usize = 7;
pub const SPIKETRAIN_CUSTOM_SIZE: usize = 2;
pub const CHANNEL_ID_SIZE: usize = 4;
pub const CHECKSUM_SIZE: usize = 4;

/// Largest packed sample run placed in one broadband message.
pub const MAX_PAYLOAD_BYTES: usize = 1400;

/// Frames claiming to be larger than this are treated as corrupt.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

pub const MAX_BROADBAND_BIT_WIDTH: u8 = 16;
pub const SPIKE_COUNT_BITS: u8 = 2;
pub const MAX_SPIKE_COUNT: u8 = 3;
