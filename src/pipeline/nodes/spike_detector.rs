//! SpikeDetectorNode: threshold-crossing detection on broadband input.
//!
//! A spike is counted when a channel's magnitude rises to or above the
//! threshold; the channel is then held off for `samples_per_spike` samples.
//! Detections are binned by sample time into `bin_size_ms` windows. Because
//! channels can arrive in separate records, a bin is emitted only once the
//! newest sample seen is a full bin past its end.
//!
//! Runs of more than [`MAX_EMPTY_BINS`] empty bins are skipped rather than
//! emitted. A record more than [`RESYNC_GAP_NS`] away from the newest sample
//! flushes the bins that hold spikes and restarts binning at that record.

use crate::ndtp::{BroadbandFrame, SpiketrainFrame};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::factory::ConfigureEnv;
use crate::pipeline::graph::NodeConfig;
use crate::pipeline::id::NodeId;
use crate::pipeline::node::{NodeContext, NodePlugin};
use crate::pipeline::node_type::NodeKind;
use crate::pipeline::record::Record;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Longest run of empty bins emitted between bins that hold spikes.
pub const MAX_EMPTY_BINS: i64 = 16;

/// Timestamp jump, in either direction, that restarts binning.
pub const RESYNC_GAP_NS: i64 = 10_000_000_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorMode {
    Thresholder { threshold_uv: f64 },
    TemplateMatcher { template_uv: Vec<f64> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpikeDetectorConfig {
    pub mode: Option<DetectorMode>,
    pub samples_per_spike: u32,
    pub bin_size_ms: u16,
    /// Microvolts represented by one sample count.
    pub uv_per_count: f64,
}

impl Default for SpikeDetectorConfig {
    fn default() -> Self {
        Self {
            mode: None,
            samples_per_spike: 32,
            bin_size_ms: 20,
            uv_per_count: 1.0,
        }
    }
}

impl NodeConfig for SpikeDetectorConfig {
    const KIND: NodeKind = NodeKind::SpikeDetector;
}

#[derive(Debug, Default, Clone)]
struct ChannelState {
    above: bool,
    holdoff: u32,
}

pub struct SpikeDetectorNode {
    id: NodeId,
    threshold_counts: f64,
    samples_per_spike: u32,
    bin_size_ms: u16,
    bin_ns: i64,
    /// Start of bin 0; set by the first record.
    origin_ns: Option<i64>,
    channels: BTreeMap<u32, ChannelState>,
    /// Bin index -> channel id -> count.
    bins: BTreeMap<i64, BTreeMap<u32, u32>>,
    next_bin: i64,
    newest_ns: i64,
}

impl SpikeDetectorNode {
    pub fn configure(config: SpikeDetectorConfig, env: &mut ConfigureEnv) -> PipelineResult<Self> {
        let id = env.node_id;
        let threshold_uv = match config.mode {
            Some(DetectorMode::Thresholder { threshold_uv }) => threshold_uv,
            Some(DetectorMode::TemplateMatcher { .. }) => {
                return Err(PipelineError::Unimplemented {
                    node_id: id,
                    feature: "template matcher",
                })
            }
            None => {
                return Err(PipelineError::invalid_config(
                    id,
                    "config must contain either 'thresholder' or 'template_matcher'",
                ))
            }
        };
        if config.bin_size_ms == 0 || !(config.uv_per_count > 0.0) {
            return Err(PipelineError::invalid_config(
                id,
                "bin size and uv_per_count must be positive",
            ));
        }
        if threshold_uv == 0.0 {
            tracing::warn!("Spike detector {}: threshold mode selected but threshold is 0", id);
        }

        Ok(Self {
            id,
            threshold_counts: threshold_uv.abs() / config.uv_per_count,
            samples_per_spike: config.samples_per_spike,
            bin_size_ms: config.bin_size_ms,
            bin_ns: i64::from(config.bin_size_ms) * 1_000_000,
            origin_ns: None,
            channels: BTreeMap::new(),
            bins: BTreeMap::new(),
            next_bin: 0,
            newest_ns: i64::MIN,
        })
    }

    /// Count crossings in `frame` and return the bins that are now complete.
    pub fn detect(&mut self, frame: &BroadbandFrame) -> Vec<SpiketrainFrame> {
        let mut ready = Vec::new();
        if let Some(origin) = self.origin_ns {
            let gap = frame.timestamp_ns.saturating_sub(self.newest_ns);
            if self.newest_ns != i64::MIN && gap.saturating_abs() > RESYNC_GAP_NS {
                tracing::warn!(
                    "Spike detector {}: timestamp jumped by {} ns, restarting bins",
                    self.id,
                    gap
                );
                ready.extend(self.resync(origin));
            }
        }
        let origin = *self.origin_ns.get_or_insert(frame.timestamp_ns);
        let mut late = 0u32;

        for channel in &frame.channels {
            let state = self.channels.entry(channel.channel_id).or_default();
            for (i, &sample) in channel.samples.iter().enumerate() {
                let t = frame.timestamp_ns.saturating_add(frame.sample_offset_ns(i));
                self.newest_ns = self.newest_ns.max(t);
                let above = f64::from(sample).abs() >= self.threshold_counts;
                if state.holdoff > 0 {
                    state.holdoff -= 1;
                } else if above && !state.above {
                    let bin = (t - origin).div_euclid(self.bin_ns);
                    if bin >= self.next_bin {
                        *self
                            .bins
                            .entry(bin)
                            .or_default()
                            .entry(channel.channel_id)
                            .or_insert(0) += 1;
                    } else {
                        late += 1;
                    }
                    state.holdoff = self.samples_per_spike;
                }
                state.above = above;
            }
        }

        if late > 0 {
            tracing::debug!("Spike detector {}: {} spikes fell in emitted bins", self.id, late);
        }

        let newest_bin = self.newest_ns.saturating_sub(origin).div_euclid(self.bin_ns);
        let cutoff = newest_bin.saturating_sub(1);
        let mut skipped = 0i64;
        while self.next_bin < cutoff {
            let next_spike = self
                .bins
                .range(self.next_bin..cutoff)
                .next()
                .map_or(cutoff, |(&bin, _)| bin);
            if next_spike - self.next_bin > MAX_EMPTY_BINS {
                skipped += next_spike - self.next_bin;
                self.next_bin = next_spike;
                continue;
            }
            let counts = self.bins.remove(&self.next_bin).unwrap_or_default();
            ready.push(self.bin_frame(origin, self.next_bin, &counts));
            self.next_bin += 1;
        }
        if skipped > 0 {
            tracing::debug!("Spike detector {}: skipped {} empty bins", self.id, skipped);
        }
        ready
    }

    fn bin_frame(&self, origin: i64, bin: i64, counts: &BTreeMap<u32, u32>) -> SpiketrainFrame {
        SpiketrainFrame {
            timestamp_ns: origin.saturating_add(bin.saturating_mul(self.bin_ns)),
            bin_size_ms: self.bin_size_ms,
            spike_counts: self
                .channels
                .keys()
                .map(|id| counts.get(id).copied().unwrap_or(0))
                .collect(),
        }
    }

    /// Emit every pending bin that holds spikes and forget the time base.
    fn resync(&mut self, origin: i64) -> Vec<SpiketrainFrame> {
        let pending = std::mem::take(&mut self.bins);
        let flushed = pending
            .iter()
            .map(|(&bin, counts)| self.bin_frame(origin, bin, counts))
            .collect();
        self.origin_ns = None;
        self.next_bin = 0;
        self.newest_ns = i64::MIN;
        for state in self.channels.values_mut() {
            *state = ChannelState::default();
        }
        flushed
    }
}

impl NodePlugin for SpikeDetectorNode {
    fn kind(&self) -> NodeKind {
        NodeKind::SpikeDetector
    }

    fn on_data_received(&mut self, record: Record, ctx: &NodeContext) {
        match record {
            Record::Broadband(frame) => {
                for bin in self.detect(&frame) {
                    ctx.emit(Record::from(bin));
                }
            }
            Record::Spiketrain(_) => {
                tracing::warn!("Spike detector {} received non-broadband data", self.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportSettings;
    use crate::ndtp::ChannelSamples;
    use crate::pipeline::factory::PortAllocator;

    fn node(config: SpikeDetectorConfig) -> PipelineResult<SpikeDetectorNode> {
        let transport = TransportSettings::default();
        let mut ports = PortAllocator::new(0);
        let mut env = ConfigureEnv {
            node_id: NodeId(5),
            transport: &transport,
            ports: &mut ports,
        };
        SpikeDetectorNode::configure(config, &mut env)
    }

    fn frame(timestamp_ns: i64, samples: Vec<i32>) -> BroadbandFrame {
        BroadbandFrame {
            timestamp_ns,
            is_signed: true,
            bit_width: 16,
            sample_rate_hz: 10_000,
            channels: vec![ChannelSamples::new(1, samples)],
        }
    }

    #[test]
    fn test_missing_mode_is_invalid() {
        let err = node(SpikeDetectorConfig::default()).err().unwrap();
        assert!(matches!(err, PipelineError::InvalidConfig { node_id: NodeId(5), .. }));
    }

    #[test]
    fn test_template_matcher_unimplemented() {
        let err = node(SpikeDetectorConfig {
            mode: Some(DetectorMode::TemplateMatcher {
                template_uv: vec![1.0, 2.0],
            }),
            ..Default::default()
        })
        .err()
        .unwrap();
        assert!(matches!(err, PipelineError::Unimplemented { .. }));
    }

    #[test]
    fn test_threshold_crossings_binned() {
        let mut detector = node(SpikeDetectorConfig {
            mode: Some(DetectorMode::Thresholder { threshold_uv: 100.0 }),
            samples_per_spike: 2,
            bin_size_ms: 1,
            uv_per_count: 1.0,
        })
        .unwrap();

        // 10 samples per bin; crossings at 1 and 5 (after holdoff) and 25.
        let mut samples = vec![0; 40];
        samples[1] = 150;
        samples[2] = 150;
        samples[5] = -200;
        samples[25] = 120;
        let bins = detector.detect(&frame(0, samples));
        let counts: Vec<Vec<u32>> = bins.iter().map(|b| b.spike_counts.clone()).collect();
        assert_eq!(counts, vec![vec![2], vec![0]]);
        assert_eq!(bins[1].timestamp_ns, 1_000_000);

        let bins = detector.detect(&frame(4_000_000, vec![0; 20]));
        let counts: Vec<Vec<u32>> = bins.iter().map(|b| b.spike_counts.clone()).collect();
        assert_eq!(counts, vec![vec![1], vec![0]]);
    }

    fn thresholder(bin_size_ms: u16) -> SpikeDetectorNode {
        node(SpikeDetectorConfig {
            mode: Some(DetectorMode::Thresholder { threshold_uv: 100.0 }),
            samples_per_spike: 2,
            bin_size_ms,
            uv_per_count: 1.0,
        })
        .unwrap()
    }

    #[test]
    fn test_timestamp_jump_restarts_bins() {
        let mut detector = thresholder(1);
        let mut samples = vec![0; 40];
        samples[25] = 150;
        let bins = detector.detect(&frame(0, samples));
        assert_eq!(bins.len(), 2);

        // An hour later: the pending spike is flushed and binning restarts.
        let later = 3_600_000_000_000;
        let bins = detector.detect(&frame(later, vec![0; 40]));
        let summary: Vec<(i64, Vec<u32>)> = bins
            .iter()
            .map(|b| (b.timestamp_ns, b.spike_counts.clone()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (2_000_000, vec![1]),
                (later, vec![0]),
                (later + 1_000_000, vec![0]),
            ]
        );
    }

    #[test]
    fn test_timestamp_jump_backwards_restarts_bins() {
        let mut detector = thresholder(1);
        detector.detect(&frame(RESYNC_GAP_NS * 2, vec![0; 40]));

        let mut samples = vec![0; 40];
        samples[5] = 150;
        let bins = detector.detect(&frame(0, samples));
        let counts: Vec<Vec<u32>> = bins.iter().map(|b| b.spike_counts.clone()).collect();
        assert_eq!(counts, vec![vec![1], vec![0]]);
        assert_eq!(bins[0].timestamp_ns, 0);
    }

    #[test]
    fn test_long_empty_runs_skipped() {
        let mut detector = thresholder(1);
        // 10 Hz: three samples span 200 one-millisecond bins.
        let mut record = frame(0, vec![0, 150, 0]);
        record.sample_rate_hz = 10;
        let bins = detector.detect(&record);
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].timestamp_ns, 100_000_000);
        assert_eq!(bins[0].spike_counts, vec![1]);
    }

    #[test]
    fn test_short_empty_runs_emitted() {
        let mut detector = thresholder(1);
        let bins = detector.detect(&frame(0, vec![0; 100]));
        // 10 ms of samples: bins 0..=7 are complete.
        assert_eq!(bins.len(), 8);
        assert!(bins.iter().all(|b| b.spike_counts == vec![0]));
    }
}
