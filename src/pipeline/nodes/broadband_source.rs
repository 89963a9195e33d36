//! BroadbandSourceNode: simulated sampler.
//!
//! Every `emit_interval_ms` it emits the samples that are due since the node
//! started, so the long-run rate matches `sample_rate_hz` even when ticks run
//! late. Samples are uniform over the range of the configured bit width.

use crate::clock::system_time_ns;
use crate::ndtp::{BroadbandFrame, ChannelSamples, MAX_BROADBAND_BIT_WIDTH};
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
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadbandSourceConfig {
    pub channel_ids: Vec<u32>,
    pub bit_width: u8,
    pub is_signed: bool,
    pub sample_rate_hz: u32,
    pub emit_interval_ms: u64,
    /// Fixed seed for reproducible output.
    pub seed: Option<u64>,
}

impl Default for BroadbandSourceConfig {
    fn default() -> Self {
        Self {
            channel_ids: (0..8).collect(),
            bit_width: 12,
            is_signed: false,
            sample_rate_hz: 16_000,
            emit_interval_ms: 10,
            seed: None,
        }
    }
}

impl NodeConfig for BroadbandSourceConfig {
    const KIND: NodeKind = NodeKind::BroadbandSource;
}

pub struct BroadbandSourceNode {
    id: NodeId,
    config: BroadbandSourceConfig,
    rng: StdRng,
    started: Option<(Instant, i64)>,
    samples_emitted: u64,
}

impl BroadbandSourceNode {
    pub fn configure(config: BroadbandSourceConfig, env: &mut ConfigureEnv) -> PipelineResult<Self> {
        let id = env.node_id;
        if config.channel_ids.is_empty() {
            return Err(PipelineError::invalid_config(id, "no channels configured"));
        }
        if config.bit_width == 0 || config.bit_width > MAX_BROADBAND_BIT_WIDTH {
            return Err(PipelineError::invalid_config(
                id,
                format!(
                    "bit width {} outside 1..={}",
                    config.bit_width, MAX_BROADBAND_BIT_WIDTH
                ),
            ));
        }
        if config.sample_rate_hz == 0 || config.emit_interval_ms == 0 {
            return Err(PipelineError::invalid_config(
                id,
                "sample rate and emit interval must be positive",
            ));
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            id,
            config,
            rng,
            started: None,
            samples_emitted: 0,
        })
    }

    fn sample_range(&self) -> (i32, i32) {
        let width = u32::from(self.config.bit_width);
        if self.config.is_signed {
            let half = 1i32 << (width - 1);
            (-half, half - 1)
        } else {
            (0, ((1i64 << width) - 1) as i32)
        }
    }

    /// Samples per channel owed at `now`.
    fn samples_due(&self, started: Instant, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(started).as_nanos();
        let due = elapsed * u128::from(self.config.sample_rate_hz) / 1_000_000_000;
        (due as u64).saturating_sub(self.samples_emitted)
    }
}

impl NodePlugin for BroadbandSourceNode {
    fn kind(&self) -> NodeKind {
        NodeKind::BroadbandSource
    }

    fn tick_interval(&self) -> Option<Duration> {
        Some(Duration::from_millis(self.config.emit_interval_ms))
    }

    fn start(&mut self, _ctx: &NodeContext) -> PipelineResult<()> {
        self.started = Some((Instant::now(), system_time_ns()));
        self.samples_emitted = 0;
        tracing::info!(
            "Broadband source {}: {} channels at {} Hz, {} bit",
            self.id,
            self.config.channel_ids.len(),
            self.config.sample_rate_hz,
            self.config.bit_width
        );
        Ok(())
    }

    fn on_data_received(&mut self, _record: Record, _ctx: &NodeContext) {
        tracing::debug!("Broadband source {} ignores upstream records", self.id);
    }

    fn tick(&mut self, ctx: &NodeContext) -> PipelineResult<()> {
        let Some((started, epoch_ns)) = self.started else {
            return Ok(());
        };
        let due = self.samples_due(started, Instant::now());
        if due == 0 {
            return Ok(());
        }

        let (lo, hi) = self.sample_range();
        let mut channels = Vec::with_capacity(self.config.channel_ids.len());
        for &channel_id in &self.config.channel_ids {
            let samples = (0..due).map(|_| self.rng.gen_range(lo..=hi)).collect();
            channels.push(ChannelSamples::new(channel_id, samples));
        }

        let mut frame = BroadbandFrame {
            timestamp_ns: epoch_ns,
            is_signed: self.config.is_signed,
            bit_width: self.config.bit_width,
            sample_rate_hz: self.config.sample_rate_hz,
            channels,
        };
        frame.timestamp_ns = epoch_ns.saturating_add(frame.sample_offset_ns(self.samples_emitted as usize));
        self.samples_emitted += due;
        ctx.emit(Record::from(frame));
        Ok(())
    }

    fn stop(&mut self) {
        tracing::info!(
            "Broadband source {} stopped after {} samples per channel",
            self.id,
            self.samples_emitted
        );
        self.started = None;
    }
}
