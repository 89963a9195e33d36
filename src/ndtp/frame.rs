//! Typed records carried between nodes, and their mapping onto messages.
//!
//! A [`BroadbandFrame`] can hold any number of channels of any length; when
//! encoded it is split into one message per channel, and a channel whose
//! packed samples exceed [`MAX_PAYLOAD_BYTES`] is further split into chunks.
//! Each chunk carries the timestamp of its first sample.

use crate::ndtp::error::{NdtpError, NdtpResult};
use crate::ndtp::message::Message;
use crate::ndtp::payload::{BroadbandPayload, ChannelSamples, Payload, SpiketrainPayload};
use crate::ndtp::MAX_PAYLOAD_BYTES;
use serde::{Deserialize, Serialize};

const NANOS_PER_SECOND: i128 = 1_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadbandFrame {
    pub timestamp_ns: i64,
    pub is_signed: bool,
    pub bit_width: u8,
    pub sample_rate_hz: u32,
    pub channels: Vec<ChannelSamples>,
}

impl BroadbandFrame {
    /// Samples of one channel that fit in a single message.
    pub fn samples_per_chunk(&self) -> usize {
        let width = self.bit_width.max(1) as usize;
        ((MAX_PAYLOAD_BYTES * 8) / width).clamp(1, u16::MAX as usize)
    }

    /// Time offset of sample `index` relative to the frame timestamp.
    pub fn sample_offset_ns(&self, index: usize) -> i64 {
        if self.sample_rate_hz == 0 {
            return 0;
        }
        (index as i128 * NANOS_PER_SECOND / self.sample_rate_hz as i128) as i64
    }

    /// Split into messages numbered from `first_sequence`, wrapping at 2^16.
    pub fn to_messages(&self, first_sequence: u16) -> NdtpResult<Vec<Message>> {
        let per_chunk = self.samples_per_chunk();
        let mut messages = Vec::new();
        let mut sequence = first_sequence;

        for channel in &self.channels {
            let mut push = |start: usize, samples: &[i32]| {
                messages.push(Message::new(
                    self.timestamp_ns.saturating_add(self.sample_offset_ns(start)),
                    sequence,
                    Payload::Broadband(BroadbandPayload {
                        is_signed: self.is_signed,
                        bit_width: self.bit_width,
                        sample_rate_hz: self.sample_rate_hz,
                        channels: vec![ChannelSamples::new(channel.channel_id, samples.to_vec())],
                    }),
                ));
                sequence = sequence.wrapping_add(1);
            };

            if channel.samples.is_empty() {
                push(0, &[]);
                continue;
            }
            for (i, chunk) in channel.samples.chunks(per_chunk).enumerate() {
                push(i * per_chunk, chunk);
            }
        }
        Ok(messages)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpiketrainFrame {
    pub timestamp_ns: i64,
    pub bin_size_ms: u16,
    /// Raw counts per channel index; saturated to 0..=3 on the wire.
    pub spike_counts: Vec<u32>,
}

impl SpiketrainFrame {
    pub fn to_message(&self, sequence: u16) -> NdtpResult<Message> {
        if self.spike_counts.len() > u16::MAX as usize {
            return Err(NdtpError::FieldOverflow("spike count length"));
        }
        Ok(Message::new(
            self.timestamp_ns,
            sequence,
            Payload::Spiketrain(SpiketrainPayload::saturating(
                self.bin_size_ms,
                self.spike_counts.iter().copied(),
            )),
        ))
    }
}

/// Either kind of frame, as decoded from a single message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Frame {
    Broadband(BroadbandFrame),
    Spiketrain(SpiketrainFrame),
}

impl Frame {
    pub fn timestamp_ns(&self) -> i64 {
        match self {
            Frame::Broadband(f) => f.timestamp_ns,
            Frame::Spiketrain(f) => f.timestamp_ns,
        }
    }

    pub fn to_messages(&self, first_sequence: u16) -> NdtpResult<Vec<Message>> {
        match self {
            Frame::Broadband(f) => f.to_messages(first_sequence),
            Frame::Spiketrain(f) => Ok(vec![f.to_message(first_sequence)?]),
        }
    }
}

impl From<Message> for Frame {
    fn from(message: Message) -> Self {
        let timestamp_ns = message.header.timestamp_ns;
        match message.payload {
            Payload::Broadband(p) => Frame::Broadband(BroadbandFrame {
                timestamp_ns,
                is_signed: p.is_signed,
                bit_width: p.bit_width,
                sample_rate_hz: p.sample_rate_hz,
                channels: p.channels,
            }),
            Payload::Spiketrain(p) => Frame::Spiketrain(SpiketrainFrame {
                timestamp_ns,
                bin_size_ms: p.bin_size_ms,
                spike_counts: p.spike_counts.into_iter().map(u32::from).collect(),
            }),
        }
    }
}
