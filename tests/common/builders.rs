//! Test data builders for frames and graphs

use synapse_dataplane::ndtp::{BroadbandFrame, ChannelSamples, SpiketrainFrame};

/// Builder for broadband frames with a ramp on every channel
pub struct BroadbandFrameBuilder {
    timestamp_ns: i64,
    bit_width: u8,
    is_signed: bool,
    sample_rate_hz: u32,
    channel_ids: Vec<u32>,
    samples_per_channel: usize,
}

impl BroadbandFrameBuilder {
    pub fn new() -> Self {
        Self {
            timestamp_ns: 1_000_000,
            bit_width: 12,
            is_signed: false,
            sample_rate_hz: 30_000,
            channel_ids: vec![0],
            samples_per_channel: 16,
        }
    }

    pub fn timestamp_ns(mut self, timestamp_ns: i64) -> Self {
        self.timestamp_ns = timestamp_ns;
        self
    }

    pub fn bit_width(mut self, bit_width: u8) -> Self {
        self.bit_width = bit_width;
        self
    }

    pub fn signed(mut self, is_signed: bool) -> Self {
        self.is_signed = is_signed;
        self
    }

    pub fn sample_rate_hz(mut self, sample_rate_hz: u32) -> Self {
        self.sample_rate_hz = sample_rate_hz;
        self
    }

    pub fn channels(mut self, channel_ids: impl IntoIterator<Item = u32>) -> Self {
        self.channel_ids = channel_ids.into_iter().collect();
        self
    }

    pub fn samples_per_channel(mut self, n: usize) -> Self {
        self.samples_per_channel = n;
        self
    }

    pub fn build(self) -> BroadbandFrame {
        let modulus = 1i64 << (self.bit_width - u8::from(self.is_signed));
        let channels = self
            .channel_ids
            .iter()
            .map(|&id| {
                let samples = (0..self.samples_per_channel)
                    .map(|i| ((i as i64 + i64::from(id)) % modulus) as i32)
                    .collect();
                ChannelSamples::new(id, samples)
            })
            .collect();
        BroadbandFrame {
            timestamp_ns: self.timestamp_ns,
            is_signed: self.is_signed,
            bit_width: self.bit_width,
            sample_rate_hz: self.sample_rate_hz,
            channels,
        }
    }
}

impl Default for BroadbandFrameBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A spiketrain frame with counts already in the wire range
pub fn spiketrain(timestamp_ns: i64, counts: &[u32]) -> SpiketrainFrame {
    SpiketrainFrame {
        timestamp_ns,
        bin_size_ms: 20,
        spike_counts: counts.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadband_builder() {
        let frame = BroadbandFrameBuilder::new()
            .channels([3, 4])
            .bit_width(4)
            .samples_per_channel(20)
            .build();

        assert_eq!(frame.channels.len(), 2);
        assert_eq!(frame.channels[1].channel_id, 4);
        assert!(frame.channels[1].samples.iter().all(|&s| (0..16).contains(&s)));
    }
}
