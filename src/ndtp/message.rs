//! Complete NDTP messages: header, payload and CRC-32 trailer.

use crate::ndtp::error::{NdtpError, NdtpResult};
use crate::ndtp::header::{le_array, Header};
use crate::ndtp::payload::{Payload, PayloadLayout};
use crate::ndtp::CHECKSUM_SIZE;
use crc32fast::Hasher;

/// CRC-32 (IEEE) over `bytes`.
pub fn checksum(bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

/// A validated message. Input that fails its checksum never becomes one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub payload: Payload,
}

impl Message {
    pub fn new(timestamp_ns: i64, sequence: u16, payload: Payload) -> Self {
        Self {
            header: Header {
                data_kind: payload.kind(),
                timestamp_ns,
                sequence,
            },
            payload,
        }
    }

    pub fn encode(&self) -> NdtpResult<Vec<u8>> {
        let payload_kind = self.payload.kind();
        if self.header.data_kind != payload_kind {
            return Err(NdtpError::KindMismatch {
                header: self.header.data_kind,
                payload: payload_kind,
            });
        }
        let mut buf = Vec::with_capacity(Header::SIZE + 64);
        self.header.write_to(&mut buf);
        self.payload.write_to(&mut buf)?;
        let crc = checksum(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        Ok(buf)
    }

    /// Decode exactly one message occupying all of `bytes`.
    pub fn decode(bytes: &[u8]) -> NdtpResult<Self> {
        let header = Header::read_from(bytes)?;
        let kind = header.data_kind;

        let prefix_end = Header::SIZE + PayloadLayout::prefix_len(kind);
        if bytes.len() < prefix_end {
            return Err(NdtpError::Truncated {
                needed: prefix_end,
                available: bytes.len(),
            });
        }
        let channel_count = u16::from_le_bytes(le_array(bytes, Header::SIZE));
        let layout = PayloadLayout::parse(kind, channel_count, &bytes[Header::SIZE + 2..prefix_end])?;

        let body_end = prefix_end + layout.body_len();
        let expected = body_end + CHECKSUM_SIZE;
        if bytes.len() < expected {
            return Err(NdtpError::Truncated {
                needed: expected,
                available: bytes.len(),
            });
        }
        if bytes.len() > expected {
            return Err(NdtpError::LengthMismatch {
                expected,
                actual: bytes.len(),
            });
        }

        let received = u32::from_le_bytes(le_array(bytes, body_end));
        let computed = checksum(&bytes[..body_end]);
        if received != computed {
            return Err(NdtpError::ChecksumMismatch {
                expected: received,
                computed,
            });
        }

        let payload = Payload::read_body(layout, &bytes[prefix_end..body_end])?;
        Ok(Self { header, payload })
    }
}
