//! Broadband and spiketrain payloads.
//!
//! Both kinds encode as `channel_count u16`, a fixed kind-specific field, then
//! a packed body whose length is fully determined by the fields before it.

use crate::ndtp::bits::{self, packed_len};
use crate::ndtp::error::{NdtpError, NdtpResult};
use crate::ndtp::header::{le_array, DataKind};
use crate::ndtp::{
    CHANNEL_COUNT_SIZE, CHANNEL_ID_SIZE, MAX_BROADBAND_BIT_WIDTH, MAX_SPIKE_COUNT,
    SPIKE_COUNT_BITS,
};
use serde::{Deserialize, Serialize};

/// Samples for a single channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSamples {
    pub channel_id: u32,
    pub samples: Vec<i32>,
}

impl ChannelSamples {
    pub fn new(channel_id: u32, samples: Vec<i32>) -> Self {
        Self {
            channel_id,
            samples,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadbandPayload {
    pub is_signed: bool,
    pub bit_width: u8,
    pub sample_rate_hz: u32,
    pub channels: Vec<ChannelSamples>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpiketrainPayload {
    pub bin_size_ms: u16,
    /// One count per channel index, 0..=3 once encoded.
    pub spike_counts: Vec<u8>,
}

impl SpiketrainPayload {
    /// Build a payload from raw counts, saturating each to the 2-bit range.
    pub fn saturating<I>(bin_size_ms: u16, counts: I) -> Self
    where
        I: IntoIterator<Item = u32>,
    {
        Self {
            bin_size_ms,
            spike_counts: counts
                .into_iter()
                .map(|c| c.min(MAX_SPIKE_COUNT as u32) as u8)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    Broadband(BroadbandPayload),
    Spiketrain(SpiketrainPayload),
}

impl Payload {
    pub fn kind(&self) -> DataKind {
        match self {
            Payload::Broadband(_) => DataKind::Broadband,
            Payload::Spiketrain(_) => DataKind::Spiketrain,
        }
    }

    /// Write channel count, custom field and body.
    pub(crate) fn write_to(&self, buf: &mut Vec<u8>) -> NdtpResult<()> {
        match self {
            Payload::Broadband(p) => p.write_to(buf),
            Payload::Spiketrain(p) => p.write_to(buf),
        }
    }

    pub(crate) fn read_body(layout: PayloadLayout, body: &[u8]) -> NdtpResult<Self> {
        match layout {
            PayloadLayout::Broadband { .. } => {
                BroadbandPayload::read_body(layout, body).map(Payload::Broadband)
            }
            PayloadLayout::Spiketrain { count, bin_size_ms } => {
                let counts = bits::unpack(body, SPIKE_COUNT_BITS, Some(count as usize))?;
                Ok(Payload::Spiketrain(SpiketrainPayload {
                    bin_size_ms,
                    spike_counts: counts.into_iter().map(|c| c as u8).collect(),
                }))
            }
        }
    }
}

/// Fields between the header and the body. Determines the body length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PayloadLayout {
    Broadband {
        channel_count: u16,
        is_signed: bool,
        bit_width: u8,
        sample_rate_hz: u32,
        samples_per_channel: u16,
    },
    Spiketrain {
        count: u16,
        bin_size_ms: u16,
    },
}

impl PayloadLayout {
    /// Parse the custom field. `custom` must be exactly `kind.custom_field_size()` bytes.
    pub(crate) fn parse(kind: DataKind, channel_count: u16, custom: &[u8]) -> NdtpResult<Self> {
        if custom.len() != kind.custom_field_size() {
            return Err(NdtpError::LengthMismatch {
                expected: kind.custom_field_size(),
                actual: custom.len(),
            });
        }
        match kind {
            DataKind::Broadband => {
                let flags = custom[0];
                let bit_width = flags >> 1;
                if bit_width == 0 || bit_width > MAX_BROADBAND_BIT_WIDTH {
                    return Err(NdtpError::InvalidBitWidth(bit_width));
                }
                Ok(PayloadLayout::Broadband {
                    channel_count,
                    is_signed: flags & 1 == 1,
                    bit_width,
                    sample_rate_hz: u32::from_le_bytes(le_array(custom, 1)),
                    samples_per_channel: u16::from_le_bytes(le_array(custom, 5)),
                })
            }
            DataKind::Spiketrain => Ok(PayloadLayout::Spiketrain {
                count: channel_count,
                bin_size_ms: u16::from_le_bytes(le_array(custom, 0)),
            }),
        }
    }

    pub(crate) fn body_len(&self) -> usize {
        match *self {
            PayloadLayout::Broadband {
                channel_count,
                bit_width,
                samples_per_channel,
                ..
            } => {
                channel_count as usize
                    * (CHANNEL_ID_SIZE + packed_len(samples_per_channel as usize, bit_width))
            }
            PayloadLayout::Spiketrain { count, .. } => packed_len(count as usize, SPIKE_COUNT_BITS),
        }
    }

    /// Channel count plus custom field size.
    pub(crate) fn prefix_len(kind: DataKind) -> usize {
        CHANNEL_COUNT_SIZE + kind.custom_field_size()
    }
}

impl BroadbandPayload {
    fn samples_per_channel(&self) -> NdtpResult<u16> {
        let expected = self.channels.first().map_or(0, |c| c.samples.len());
        if let Some(uneven) = self.channels.iter().find(|c| c.samples.len() != expected) {
            return Err(NdtpError::UnevenChannels {
                expected,
                actual: uneven.samples.len(),
            });
        }
        u16::try_from(expected).map_err(|_| NdtpError::FieldOverflow("samples per channel"))
    }

    fn pack_samples(&self, samples: &[i32]) -> NdtpResult<Vec<u8>> {
        if self.is_signed {
            return bits::pack_signed(samples, self.bit_width);
        }
        let unsigned = samples
            .iter()
            .map(|&s| {
                u32::try_from(s).map_err(|_| NdtpError::ValueOutOfRange {
                    value: s as i64,
                    bit_width: self.bit_width,
                })
            })
            .collect::<NdtpResult<Vec<u32>>>()?;
        bits::pack(&unsigned, self.bit_width)
    }

    fn write_to(&self, buf: &mut Vec<u8>) -> NdtpResult<()> {
        if self.bit_width == 0 || self.bit_width > MAX_BROADBAND_BIT_WIDTH {
            return Err(NdtpError::InvalidBitWidth(self.bit_width));
        }
        let channel_count = u16::try_from(self.channels.len())
            .map_err(|_| NdtpError::FieldOverflow("channel count"))?;
        let samples_per_channel = self.samples_per_channel()?;

        buf.extend_from_slice(&channel_count.to_le_bytes());
        buf.push(self.bit_width << 1 | self.is_signed as u8);
        buf.extend_from_slice(&self.sample_rate_hz.to_le_bytes());
        buf.extend_from_slice(&samples_per_channel.to_le_bytes());
        for channel in &self.channels {
            buf.extend_from_slice(&channel.channel_id.to_le_bytes());
            buf.extend_from_slice(&self.pack_samples(&channel.samples)?);
        }
        Ok(())
    }

    fn read_body(layout: PayloadLayout, body: &[u8]) -> NdtpResult<Self> {
        let PayloadLayout::Broadband {
            channel_count,
            is_signed,
            bit_width,
            sample_rate_hz,
            samples_per_channel,
        } = layout
        else {
            return Err(NdtpError::KindMismatch {
                header: DataKind::Broadband,
                payload: DataKind::Spiketrain,
            });
        };
        if body.len() != layout.body_len() {
            return Err(NdtpError::LengthMismatch {
                expected: layout.body_len(),
                actual: body.len(),
            });
        }

        let count = samples_per_channel as usize;
        let stride = CHANNEL_ID_SIZE + packed_len(count, bit_width);
        let channels = body
            .chunks_exact(stride)
            .take(channel_count as usize)
            .map(|chunk| {
                let channel_id = u32::from_le_bytes(le_array(chunk, 0));
                let packed = &chunk[CHANNEL_ID_SIZE..];
                let samples = if is_signed {
                    bits::unpack_signed(packed, bit_width, Some(count))?
                } else {
                    bits::unpack(packed, bit_width, Some(count))?
                        .into_iter()
                        .map(|v| v as i32)
                        .collect()
                };
                Ok(ChannelSamples {
                    channel_id,
                    samples,
                })
            })
            .collect::<NdtpResult<Vec<_>>>()?;

        Ok(Self {
            is_signed,
            bit_width,
            sample_rate_hz,
            channels,
        })
    }
}

impl SpiketrainPayload {
    fn write_to(&self, buf: &mut Vec<u8>) -> NdtpResult<()> {
        let count = u16::try_from(self.spike_counts.len())
            .map_err(|_| NdtpError::FieldOverflow("spike count length"))?;
        buf.extend_from_slice(&count.to_le_bytes());
        buf.extend_from_slice(&self.bin_size_ms.to_le_bytes());
        let saturated: Vec<u32> = self
            .spike_counts
            .iter()
            .map(|&c| c.min(MAX_SPIKE_COUNT) as u32)
            .collect();
        buf.extend_from_slice(&bits::pack(&saturated, SPIKE_COUNT_BITS)?);
        Ok(())
    }
}
