//! SpikeSourceNode: simulated spike counts, one frame per bin.

use crate::clock::system_time_ns;
use crate::ndtp::SpiketrainFrame;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::factory::ConfigureEnv;
use crate::pipeline::graph::NodeConfig;
use crate::pipeline::id::NodeId;
use crate::pipeline::node::{NodeContext, NodePlugin};
use crate::pipeline::node_type::NodeKind;
use crate::pipeline::record::Record;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpikePattern {
    /// A bump of activity sweeping across channels.
    #[default]
    Sine,
    /// A diagonal ramp moving across channels.
    Linear,
    /// Sparse random counts.
    Noise,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpikeSourceConfig {
    pub channel_count: u32,
    pub bin_size_ms: u16,
    pub pattern: SpikePattern,
    pub seed: Option<u64>,
}

impl Default for SpikeSourceConfig {
    fn default() -> Self {
        Self {
            channel_count: 32,
            bin_size_ms: 20,
            pattern: SpikePattern::Sine,
            seed: None,
        }
    }
}

impl NodeConfig for SpikeSourceConfig {
    const KIND: NodeKind = NodeKind::SpikeSource;
}

/// Counts for one bin of the sweeping bump.
pub fn sine_counts(channels: usize, phase: usize, base: u32, amplitude: u32) -> Vec<u32> {
    let period = (channels * 2).max(1);
    let y = (TAU * phase as f64 / period as f64).sin();
    let active = ((y + 1.0) * (channels.saturating_sub(1)) as f64 / 2.0) as usize;

    let mut counts = vec![base; channels];
    let lo = active.saturating_sub(1);
    let hi = (active + 2).min(channels);
    for (ch, count) in counts.iter_mut().enumerate().take(hi).skip(lo) {
        *count = if ch == active {
            base + amplitude
        } else {
            base + amplitude / 2
        };
    }
    counts
}

/// Counts for one bin of the ramp.
pub fn linear_counts(channels: usize, phase: usize, max_count: u32) -> Vec<u32> {
    let period = (channels * 2).max(1);
    (0..channels)
        .map(|ch| {
            let ch_phase = (phase + ch * period / channels.max(1)) % period;
            (u64::from(max_count) * ch_phase as u64 / period as u64) as u32
        })
        .collect()
}

pub struct SpikeSourceNode {
    id: NodeId,
    config: SpikeSourceConfig,
    rng: StdRng,
    phase: usize,
    bin_start_ns: i64,
    bins_emitted: u64,
}

impl SpikeSourceNode {
    pub fn configure(config: SpikeSourceConfig, env: &mut ConfigureEnv) -> PipelineResult<Self> {
        if config.channel_count == 0 || config.bin_size_ms == 0 {
            return Err(PipelineError::invalid_config(
                env.node_id,
                "channel count and bin size must be positive",
            ));
        }
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            id: env.node_id,
            config,
            rng,
            phase: 0,
            bin_start_ns: 0,
            bins_emitted: 0,
        })
    }

    fn next_counts(&mut self) -> Vec<u32> {
        let channels = self.config.channel_count as usize;
        let max_count = u32::from(self.config.bin_size_ms);
        let counts = match self.config.pattern {
            SpikePattern::Sine => sine_counts(channels, self.phase, max_count / 4, max_count / 2),
            SpikePattern::Linear => linear_counts(channels, self.phase, max_count),
            SpikePattern::Noise => (0..channels)
                .map(|_| {
                    if self.rng.gen_bool(0.3) {
                        self.rng.gen_range(0..16)
                    } else {
                        0
                    }
                })
                .collect(),
        };
        self.phase = (self.phase + 1) % (channels * 2);
        counts
    }
}

impl NodePlugin for SpikeSourceNode {
    fn kind(&self) -> NodeKind {
        NodeKind::SpikeSource
    }

    fn tick_interval(&self) -> Option<Duration> {
        Some(Duration::from_millis(u64::from(self.config.bin_size_ms)))
    }

    fn start(&mut self, _ctx: &NodeContext) -> PipelineResult<()> {
        self.bin_start_ns = system_time_ns();
        self.phase = 0;
        Ok(())
    }

    fn on_data_received(&mut self, _record: Record, _ctx: &NodeContext) {
        tracing::debug!("Spike source {} ignores upstream records", self.id);
    }

    fn tick(&mut self, ctx: &NodeContext) -> PipelineResult<()> {
        let spike_counts = self.next_counts();
        let now = system_time_ns();
        ctx.emit(Record::from(SpiketrainFrame {
            timestamp_ns: self.bin_start_ns,
            bin_size_ms: self.config.bin_size_ms,
            spike_counts,
        }));
        self.bin_start_ns = now;
        self.bins_emitted += 1;
        Ok(())
    }

    fn stop(&mut self) {
        tracing::info!("Spike source {} stopped after {} bins", self.id, self.bins_emitted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_bump() {
        // phase 0: y = 0, active channel = (n - 1) / 2
        let counts = sine_counts(5, 0, 5, 10);
        assert_eq!(counts, vec![5, 10, 15, 10, 5]);
    }

    #[test]
    fn test_sine_bump_clipped_at_edge() {
        // phase n/2 of a 2n period: y = 1, active channel = n - 1
        let counts = sine_counts(4, 2, 1, 4);
        assert_eq!(counts, vec![1, 1, 3, 5]);
    }

    #[test]
    fn test_linear_ramp() {
        let counts = linear_counts(4, 0, 20);
        assert_eq!(counts, vec![0, 5, 10, 15]);
        let counts = linear_counts(4, 1, 20);
        assert_eq!(counts, vec![2, 7, 12, 17]);
    }
}
