//! Codec error types.

use thiserror::Error;

/// Errors raised while encoding or decoding NDTP data.
///
/// Decoding errors describe malformed input and are non-fatal to a stream;
/// encoding errors are contract violations by the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NdtpError {
    #[error("Invalid bit width: {0}")]
    InvalidBitWidth(u8),

    #[error("Value {value} does not fit in {bit_width} bits")]
    ValueOutOfRange { value: i64, bit_width: u8 },

    #[error("Incomplete trailing value: {remaining_bits} bits left over")]
    IncompleteTrailingValue { remaining_bits: usize },

    #[error("Truncated input: needed {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },

    #[error("Invalid magic 0x{0:08X}")]
    InvalidMagic(u32),

    #[error("Unknown data kind 0x{0:02X}")]
    UnknownDataKind(u8),

    #[error("Header kind {header:?} does not match payload kind {payload:?}")]
    KindMismatch {
        header: crate::ndtp::DataKind,
        payload: crate::ndtp::DataKind,
    },

    #[error("Checksum mismatch: expected 0x{expected:08X}, computed 0x{computed:08X}")]
    ChecksumMismatch { expected: u32, computed: u32 },

    #[error("Frame length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Channels in one message must have equal sample counts ({expected} != {actual})")]
    UnevenChannels { expected: usize, actual: usize },

    #[error("Field overflow: {0}")]
    FieldOverflow(&'static str),
}

pub type NdtpResult<T> = std::result::Result<T, NdtpError>;
