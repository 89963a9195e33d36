//! Node construction from graph descriptions.

use crate::config::TransportSettings;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::graph::NodeSpec;
use crate::pipeline::id::NodeId;
use crate::pipeline::node::BuiltinNode;
use crate::pipeline::node_type::NodeKind;
use crate::pipeline::nodes::{
    ApplicationNode, BroadbandSourceNode, DiskWriterNode, OpticalStimulationNode,
    SpectralFilterNode, SpikeBinnerNode, SpikeDetectorNode, SpikeSourceNode, StreamInNode,
    StreamOutNode,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// Hands out ports to transport nodes: `base_port + n` for the n-th instance
/// of a kind within one configuration. A base of zero lets the OS choose.
#[derive(Debug, Clone)]
pub struct PortAllocator {
    base_port: u16,
    instances: HashMap<NodeKind, u16>,
}

impl PortAllocator {
    pub fn new(base_port: u16) -> Self {
        Self {
            base_port,
            instances: HashMap::new(),
        }
    }

    pub fn next_port(&mut self, kind: NodeKind) -> u16 {
        let instance = self.instances.entry(kind).or_insert(0);
        let index = *instance;
        *instance = instance.saturating_add(1);
        if self.base_port == 0 {
            0
        } else {
            self.base_port.saturating_add(index)
        }
    }

    /// Forget all instances; called when a graph is torn down.
    pub fn reset(&mut self) {
        self.instances.clear();
    }
}

/// What a node may use while configuring itself.
pub struct ConfigureEnv<'a> {
    pub node_id: NodeId,
    pub transport: &'a TransportSettings,
    pub ports: &'a mut PortAllocator,
}

/// Builds and configures nodes from their graph description.
pub struct NodeFactory;

impl NodeFactory {
    pub fn create(
        spec: &NodeSpec,
        transport: &TransportSettings,
        ports: &mut PortAllocator,
    ) -> PipelineResult<BuiltinNode> {
        let kind: NodeKind = spec.kind.parse().map_err(|_| PipelineError::UnknownKind {
            node_id: spec.id,
            kind: spec.kind.clone(),
        })?;
        let mut env = ConfigureEnv {
            node_id: spec.id,
            transport,
            ports,
        };

        match kind {
            NodeKind::BroadbandSource => {
                BroadbandSourceNode::configure(parse(spec)?, &mut env).map(BuiltinNode::BroadbandSource)
            }
            NodeKind::SpikeSource => {
                SpikeSourceNode::configure(parse(spec)?, &mut env).map(BuiltinNode::SpikeSource)
            }
            NodeKind::SpectralFilter => {
                SpectralFilterNode::configure(parse(spec)?, &mut env).map(BuiltinNode::SpectralFilter)
            }
            NodeKind::SpikeDetector => {
                SpikeDetectorNode::configure(parse(spec)?, &mut env).map(BuiltinNode::SpikeDetector)
            }
            NodeKind::SpikeBinner => {
                SpikeBinnerNode::configure(parse(spec)?, &mut env).map(BuiltinNode::SpikeBinner)
            }
            NodeKind::StreamIn => {
                StreamInNode::configure(parse(spec)?, &mut env).map(BuiltinNode::StreamIn)
            }
            NodeKind::StreamOut => {
                StreamOutNode::configure(parse(spec)?, &mut env).map(BuiltinNode::StreamOut)
            }
            NodeKind::OpticalStimulation => OpticalStimulationNode::configure(parse(spec)?, &mut env)
                .map(BuiltinNode::OpticalStimulation),
            NodeKind::DiskWriter => {
                DiskWriterNode::configure(parse(spec)?, &mut env).map(BuiltinNode::DiskWriter)
            }
            NodeKind::Application => {
                ApplicationNode::configure(parse(spec)?, &mut env).map(BuiltinNode::Application)
            }
        }
    }
}

/// Deserialize a node's config. A missing config means "all defaults".
fn parse<T: DeserializeOwned>(spec: &NodeSpec) -> PipelineResult<T> {
    let value = match &spec.config {
        serde_json::Value::Null => serde_json::Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(value).map_err(|e| PipelineError::invalid_config(spec.id, e.to_string()))
}
