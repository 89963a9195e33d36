//! SpikeBinnerNode: merges consecutive spiketrain bins into wider windows.

use crate::ndtp::SpiketrainFrame;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::factory::ConfigureEnv;
use crate::pipeline::graph::NodeConfig;
use crate::pipeline::id::NodeId;
use crate::pipeline::node::{NodeContext, NodePlugin};
use crate::pipeline::node_type::NodeKind;
use crate::pipeline::record::Record;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpikeBinnerConfig {
    pub bin_size_ms: u16,
}

impl Default for SpikeBinnerConfig {
    fn default() -> Self {
        Self { bin_size_ms: 100 }
    }
}

impl NodeConfig for SpikeBinnerConfig {
    const KIND: NodeKind = NodeKind::SpikeBinner;
}

#[derive(Debug)]
struct OpenBin {
    timestamp_ns: i64,
    span_ms: u32,
    counts: Vec<u32>,
}

pub struct SpikeBinnerNode {
    id: NodeId,
    bin_size_ms: u16,
    open: Option<OpenBin>,
}

impl SpikeBinnerNode {
    pub fn configure(config: SpikeBinnerConfig, env: &mut ConfigureEnv) -> PipelineResult<Self> {
        if config.bin_size_ms == 0 {
            return Err(PipelineError::invalid_config(env.node_id, "bin size must be positive"));
        }
        Ok(Self {
            id: env.node_id,
            bin_size_ms: config.bin_size_ms,
            open: None,
        })
    }

    /// Add one input bin. Returns the merged bin once it spans at least
    /// `bin_size_ms`, or the partial bin when the channel count changes.
    /// An input bin of width 0 counts as a full window.
    pub fn accumulate(&mut self, frame: &SpiketrainFrame) -> Vec<SpiketrainFrame> {
        let mut ready = Vec::new();
        let open_channels = self.open.as_ref().map(|open| open.counts.len());
        if let Some(channels) = open_channels.filter(|&n| n != frame.spike_counts.len()) {
            tracing::debug!(
                "Spike binner {}: channel count changed {} -> {}",
                self.id,
                channels,
                frame.spike_counts.len()
            );
            ready.extend(self.flush());
        }

        // A bin without a width closes the window on its own.
        let width = if frame.bin_size_ms == 0 {
            tracing::debug!("Spike binner {}: input bin has no width", self.id);
            self.bin_size_ms
        } else {
            frame.bin_size_ms
        };
        let open = self.open.get_or_insert_with(|| OpenBin {
            timestamp_ns: frame.timestamp_ns,
            span_ms: 0,
            counts: vec![0; frame.spike_counts.len()],
        });
        for (total, &count) in open.counts.iter_mut().zip(&frame.spike_counts) {
            *total = total.saturating_add(count);
        }
        open.span_ms += u32::from(width);

        if open.span_ms >= u32::from(self.bin_size_ms) {
            ready.extend(self.flush());
        }
        ready
    }

    fn flush(&mut self) -> Option<SpiketrainFrame> {
        self.open.take().map(|open| SpiketrainFrame {
            timestamp_ns: open.timestamp_ns,
            bin_size_ms: u16::try_from(open.span_ms).unwrap_or(u16::MAX),
            spike_counts: open.counts,
        })
    }
}

impl NodePlugin for SpikeBinnerNode {
    fn kind(&self) -> NodeKind {
        NodeKind::SpikeBinner
    }

    fn on_data_received(&mut self, record: Record, ctx: &NodeContext) {
        match record {
            Record::Spiketrain(frame) => {
                for merged in self.accumulate(&frame) {
                    ctx.emit(Record::from(merged));
                }
            }
            Record::Broadband(_) => {
                tracing::warn!("Spike binner {} received non-spiketrain data", self.id);
            }
        }
    }

    fn stop(&mut self) {
        if self.open.take().is_some() {
            tracing::debug!("Spike binner {} discarded a partial bin", self.id);
        }
    }
}
