//! Fixed message header: magic, data kind, timestamp and sequence number.

use crate::ndtp::error::{NdtpError, NdtpResult};
use crate::ndtp::{BROADBAND_CUSTOM_SIZE, NDTP_MAGIC, SPIKETRAIN_CUSTOM_SIZE};
use serde::{Deserialize, Serialize};

/// Kind of payload a message carries. Encoded as the type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Broadband,
    Spiketrain,
}

impl DataKind {
    pub const fn type_byte(self) -> u8 {
        match self {
            DataKind::Broadband => 0x01,
            DataKind::Spiketrain => 0x02,
        }
    }

    pub fn from_type_byte(byte: u8) -> NdtpResult<Self> {
        match byte {
            0x01 => Ok(DataKind::Broadband),
            0x02 => Ok(DataKind::Spiketrain),
            other => Err(NdtpError::UnknownDataKind(other)),
        }
    }

    /// Size of the kind-specific field that follows the channel count.
    pub const fn custom_field_size(self) -> usize {
        match self {
            DataKind::Broadband => BROADBAND_CUSTOM_SIZE,
            DataKind::Spiketrain => SPIKETRAIN_CUSTOM_SIZE,
        }
    }
}

/// Message header. The magic is implicit: always [`NDTP_MAGIC`] on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub data_kind: DataKind,
    pub timestamp_ns: i64,
    pub sequence: u16,
}

impl Header {
    /// Encoded size in bytes.
    pub const SIZE: usize = 15;

    pub fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&NDTP_MAGIC.to_le_bytes());
        buf.push(self.data_kind.type_byte());
        buf.extend_from_slice(&self.timestamp_ns.to_le_bytes());
        buf.extend_from_slice(&self.sequence.to_le_bytes());
    }

    pub fn read_from(bytes: &[u8]) -> NdtpResult<Self> {
        if bytes.len() < Self::SIZE {
            return Err(NdtpError::Truncated {
                needed: Self::SIZE,
                available: bytes.len(),
            });
        }
        let magic = u32::from_le_bytes(le_array(bytes, 0));
        if magic != NDTP_MAGIC {
            return Err(NdtpError::InvalidMagic(magic));
        }
        Ok(Self {
            data_kind: DataKind::from_type_byte(bytes[4])?,
            timestamp_ns: i64::from_le_bytes(le_array(bytes, 5)),
            sequence: u16::from_le_bytes(le_array(bytes, 13)),
        })
    }
}

/// Copy `N` bytes starting at `offset`. Callers check bounds first.
#[inline]
pub(crate) fn le_array<const N: usize>(bytes: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[offset..offset + N]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = Header {
            data_kind: DataKind::Spiketrain,
            timestamp_ns: 0x0102_0304_0506_0708,
            sequence: 0xBEEF,
        };
        let mut buf = Vec::new();
        header.write_to(&mut buf);
        assert_eq!(buf.len(), Header::SIZE);
        assert_eq!(&buf[0..4], &[0x00, 0xEE, 0xFF, 0xC0]);
        assert_eq!(buf[4], 0x02);
        assert_eq!(&buf[5..13], &[8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(&buf[13..15], &[0xEF, 0xBE]);
        assert_eq!(Header::read_from(&buf).unwrap(), header);
    }

    #[test]
    fn test_bad_magic_and_kind() {
        let mut buf = Vec::new();
        Header {
            data_kind: DataKind::Broadband,
            timestamp_ns: 0,
            sequence: 0,
        }
        .write_to(&mut buf);

        let mut bad_kind = buf.clone();
        bad_kind[4] = 0x7F;
        assert_eq!(
            Header::read_from(&bad_kind),
            Err(NdtpError::UnknownDataKind(0x7F))
        );

        buf[0] ^= 0xFF;
        assert!(matches!(
            Header::read_from(&buf),
            Err(NdtpError::InvalidMagic(_))
        ));
    }
}
