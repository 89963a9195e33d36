//! Incremental parser that rebuilds messages from an arbitrary byte stream.
//!
//! Bytes are pushed in whatever chunks the transport delivers (single bytes,
//! partial frames, several frames coalesced). The parser keeps exactly one
//! in-progress frame and advances field by field:
//!
//! ```text
//! ReadMagic -> ReadTypeByte -> ReadTimestamp -> ReadSequence
//!   -> ReadChannelCount -> ReadCustomField -> ReadPayload -> ReadChecksum
//! ```
//!
//! The body length is computed from the channel count and custom field, so no
//! outer framing is needed. Frames that fail validation are logged, counted
//! and dropped; the parser then resynchronises on the next magic.

use crate::ndtp::header::{le_array, DataKind, Header};
use crate::ndtp::message::Message;
use crate::ndtp::payload::PayloadLayout;
use crate::ndtp::{CHECKSUM_SIZE, MAX_FRAME_SIZE, NDTP_MAGIC};
use std::collections::VecDeque;

const MAGIC_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    ReadMagic,
    ReadTypeByte,
    ReadTimestamp,
    ReadSequence,
    ReadChannelCount,
    ReadCustomField,
    ReadPayload,
    ReadChecksum,
}

/// Running totals for a depacketizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DepacketizerStats {
    pub frames_accepted: u64,
    pub frames_discarded: u64,
    /// Bytes skipped while searching for a magic.
    pub bytes_skipped: u64,
}

#[derive(Debug)]
pub struct Depacketizer {
    state: ParseState,
    /// Bytes of the in-progress frame, starting at its magic.
    frame: Vec<u8>,
    /// Frame length at which the current state's field is complete.
    target: usize,
    kind: Option<DataKind>,
    queue: VecDeque<Message>,
    stats: DepacketizerStats,
}

impl Default for Depacketizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Depacketizer {
    pub fn new() -> Self {
        Self {
            state: ParseState::ReadMagic,
            frame: Vec::with_capacity(256),
            target: MAGIC_SIZE,
            kind: None,
            queue: VecDeque::new(),
            stats: DepacketizerStats::default(),
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn stats(&self) -> DepacketizerStats {
        self.stats
    }

    /// Feed a chunk of bytes. Returns the number of messages completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> usize {
        let before = self.stats.frames_accepted;
        let mut cursor = 0;
        while cursor < chunk.len() {
            let take = (self.target - self.frame.len()).min(chunk.len() - cursor);
            self.frame.extend_from_slice(&chunk[cursor..cursor + take]);
            cursor += take;
            while self.frame.len() == self.target {
                self.advance();
            }
        }
        (self.stats.frames_accepted - before) as usize
    }

    /// Pop the oldest completed message.
    pub fn next_message(&mut self) -> Option<Message> {
        self.queue.pop_front()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Message> + '_ {
        self.queue.drain(..)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drop any partially parsed frame.
    pub fn reset(&mut self) {
        self.state = ParseState::ReadMagic;
        self.frame.clear();
        self.target = MAGIC_SIZE;
        self.kind = None;
    }

    fn enter(&mut self, state: ParseState, field_len: usize) {
        self.state = state;
        self.target += field_len;
    }

    fn discard(&mut self, reason: impl std::fmt::Display) {
        tracing::warn!(
            "Discarding NDTP frame in state {:?} after {} bytes: {}",
            self.state,
            self.frame.len(),
            reason
        );
        self.stats.frames_discarded += 1;
        self.reset();
    }

    /// Called when the current field is complete.
    fn advance(&mut self) {
        match self.state {
            ParseState::ReadMagic => {
                if u32::from_le_bytes(le_array(&self.frame, 0)) == NDTP_MAGIC {
                    self.enter(ParseState::ReadTypeByte, 1);
                } else {
                    // Slide the window by one byte and keep looking.
                    self.frame.remove(0);
                    self.stats.bytes_skipped += 1;
                    if self.stats.bytes_skipped % 1024 == 1 {
                        tracing::debug!(
                            "NDTP stream out of sync, {} bytes skipped so far",
                            self.stats.bytes_skipped
                        );
                    }
                }
            }
            ParseState::ReadTypeByte => match DataKind::from_type_byte(self.frame[MAGIC_SIZE]) {
                Ok(kind) => {
                    self.kind = Some(kind);
                    self.enter(ParseState::ReadTimestamp, 8);
                }
                Err(e) => self.discard(e),
            },
            ParseState::ReadTimestamp => self.enter(ParseState::ReadSequence, 2),
            ParseState::ReadSequence => self.enter(ParseState::ReadChannelCount, 2),
            ParseState::ReadChannelCount => {
                let Some(kind) = self.kind else {
                    self.discard("missing data kind");
                    return;
                };
                self.enter(ParseState::ReadCustomField, kind.custom_field_size());
            }
            ParseState::ReadCustomField => self.on_custom_field(),
            ParseState::ReadPayload => self.enter(ParseState::ReadChecksum, CHECKSUM_SIZE),
            ParseState::ReadChecksum => {
                match Message::decode(&self.frame) {
                    Ok(message) => {
                        self.stats.frames_accepted += 1;
                        self.queue.push_back(message);
                        self.reset();
                    }
                    Err(e) => self.discard(e),
                }
            }
        }
    }

    fn on_custom_field(&mut self) {
        let Some(kind) = self.kind else {
            self.discard("missing data kind");
            return;
        };
        let channel_count = u16::from_le_bytes(le_array(&self.frame, Header::SIZE));
        let custom_start = Header::SIZE + 2;
        let layout = match PayloadLayout::parse(kind, channel_count, &self.frame[custom_start..])
        {
            Ok(layout) => layout,
            Err(e) => {
                self.discard(e);
                return;
            }
        };

        let body_len = layout.body_len();
        let total = self.frame.len() + body_len + CHECKSUM_SIZE;
        if total > MAX_FRAME_SIZE {
            self.discard(format!(
                "frame of {} bytes exceeds {} byte limit",
                total, MAX_FRAME_SIZE
            ));
            return;
        }
        self.enter(ParseState::ReadPayload, body_len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ndtp::{BroadbandPayload, ChannelSamples, Payload, SpiketrainPayload};
    use proptest::prelude::*;

    fn broadband(sequence: u16) -> Message {
        Message::new(
            123_456_789,
            sequence,
            Payload::Broadband(BroadbandPayload {
                is_signed: true,
                bit_width: 10,
                sample_rate_hz: 20_000,
                channels: vec![ChannelSamples::new(5, vec![-512, 0, 511, 17, -3])],
            }),
        )
    }

    fn spiketrain(sequence: u16) -> Message {
        Message::new(
            99,
            sequence,
            Payload::Spiketrain(SpiketrainPayload {
                bin_size_ms: 10,
                spike_counts: vec![3, 0, 1],
            }),
        )
    }

    #[test]
    fn test_single_chunk() {
        let msg = broadband(1);
        let mut depacketizer = Depacketizer::new();
        assert_eq!(depacketizer.push(&msg.encode().unwrap()), 1);
        assert_eq!(depacketizer.next_message(), Some(msg));
        assert_eq!(depacketizer.state(), ParseState::ReadMagic);
    }

    #[test]
    fn test_byte_at_a_time() {
        let msg = broadband(2);
        let bytes = msg.encode().unwrap();
        let mut depacketizer = Depacketizer::new();
        let completed: usize = bytes.iter().map(|b| depacketizer.push(&[*b])).sum();
        assert_eq!(completed, 1);
        assert_eq!(depacketizer.drain().collect::<Vec<_>>(), vec![msg]);
    }

    #[test]
    fn test_coalesced_frames() {
        let mut stream = broadband(1).encode().unwrap();
        stream.extend(spiketrain(2).encode().unwrap());
        stream.extend(broadband(3).encode().unwrap());

        let mut depacketizer = Depacketizer::new();
        assert_eq!(depacketizer.push(&stream), 3);
        let sequences: Vec<u16> = depacketizer.drain().map(|m| m.header.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[test]
    fn test_resync_after_garbage() {
        let mut stream = vec![0xAA, 0x00, 0xEE, 0x13, 0x37];
        stream.extend(spiketrain(9).encode().unwrap());
        let mut depacketizer = Depacketizer::new();
        assert_eq!(depacketizer.push(&stream), 1);
        assert_eq!(depacketizer.stats().bytes_skipped, 5);
    }

    #[test]
    fn test_corrupt_frame_then_valid_frame() {
        let mut bad = spiketrain(1).encode().unwrap();
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;
        let good = spiketrain(2);

        let mut depacketizer = Depacketizer::new();
        depacketizer.push(&bad);
        depacketizer.push(&good.encode().unwrap());
        assert_eq!(depacketizer.stats().frames_discarded, 1);
        assert_eq!(depacketizer.drain().collect::<Vec<_>>(), vec![good]);
    }

    #[test]
    fn test_invalid_bit_width_discarded_early() {
        let mut bytes = broadband(1).encode().unwrap();
        bytes[Header::SIZE + 2] = 0; // bit width 0
        let mut depacketizer = Depacketizer::new();
        depacketizer.push(&bytes[..Header::SIZE + 2 + 7]);
        assert_eq!(depacketizer.stats().frames_discarded, 1);
        assert_eq!(depacketizer.state(), ParseState::ReadMagic);
    }

    #[test]
    fn test_oversized_frame_discarded() {
        let mut bytes = broadband(1).encode().unwrap();
        // 65535 channels of 16-bit samples cannot fit in the frame limit
        bytes[Header::SIZE] = 0xFF;
        bytes[Header::SIZE + 1] = 0xFF;
        bytes[Header::SIZE + 2] = 16 << 1;
        let mut depacketizer = Depacketizer::new();
        depacketizer.push(&bytes);
        assert!(depacketizer.stats().frames_discarded >= 1);
        assert_eq!(depacketizer.pending(), 0);
    }

    proptest! {
        #[test]
        fn prop_single_byte_corruption_never_emits(
            index in 0usize..37,
            flip in 1u8..=255,
        ) {
            let mut bytes = broadband(7).encode().unwrap();
            let index = index % bytes.len();
            bytes[index] ^= flip;
            let mut depacketizer = Depacketizer::new();
            depacketizer.push(&bytes);
            prop_assert_eq!(depacketizer.pending(), 0);
        }

        #[test]
        fn prop_fragmentation_invariance(
            splits in prop::collection::vec(1usize..16, 1..40),
        ) {
            let mut stream = broadband(1).encode().unwrap();
            stream.extend(spiketrain(2).encode().unwrap());

            let mut whole = Depacketizer::new();
            whole.push(&stream);
            let expected: Vec<Message> = whole.drain().collect();

            let mut pieces = Depacketizer::new();
            let mut rest = &stream[..];
            for size in splits.iter().cycle() {
                if rest.is_empty() {
                    break;
                }
                let (head, tail) = rest.split_at((*size).min(rest.len()));
                pieces.push(head);
                rest = tail;
            }
            let actual: Vec<Message> = pieces.drain().collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
