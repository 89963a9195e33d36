//! OpticalStimulationNode: stimulation sink.
//!
//! There is no stimulator hardware behind it; every record is logged and
//! counted so graphs that end in stimulation can be exercised end to end.

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
pub struct OpticalStimulationConfig {
    pub peripheral_id: u32,
    /// Pixels the stimulator would drive; empty drives all.
    pub pixel_mask: Vec<u32>,
    /// Fraction of full output, 0.0..=1.0.
    pub intensity: f32,
}

impl Default for OpticalStimulationConfig {
    fn default() -> Self {
        Self {
            peripheral_id: 0,
            pixel_mask: Vec::new(),
            intensity: 1.0,
        }
    }
}

impl NodeConfig for OpticalStimulationConfig {
    const KIND: NodeKind = NodeKind::OpticalStimulation;
}

pub struct OpticalStimulationNode {
    id: NodeId,
    config: OpticalStimulationConfig,
    received: u64,
}

impl OpticalStimulationNode {
    pub fn configure(config: OpticalStimulationConfig, env: &mut ConfigureEnv) -> PipelineResult<Self> {
        if !(0.0..=1.0).contains(&config.intensity) {
            return Err(PipelineError::invalid_config(
                env.node_id,
                format!("intensity {} outside 0.0..=1.0", config.intensity),
            ));
        }
        Ok(Self {
            id: env.node_id,
            config,
            received: 0,
        })
    }

    pub fn received(&self) -> u64 {
        self.received
    }
}

impl NodePlugin for OpticalStimulationNode {
    fn kind(&self) -> NodeKind {
        NodeKind::OpticalStimulation
    }

    fn start(&mut self, _ctx: &NodeContext) -> PipelineResult<()> {
        tracing::info!(
            "Optical stimulation {} started (peripheral {}, {} pixels, intensity {})",
            self.id,
            self.config.peripheral_id,
            self.config.pixel_mask.len(),
            self.config.intensity
        );
        Ok(())
    }

    fn on_data_received(&mut self, record: Record, _ctx: &NodeContext) {
        self.received += 1;
        tracing::debug!(
            "Optical stimulation {}: {:?} record at {}",
            self.id,
            record.kind(),
            record.timestamp_ns()
        );
    }

    fn stop(&mut self) {
        tracing::info!("Optical stimulation {} stopped after {} records", self.id, self.received);
    }
}
