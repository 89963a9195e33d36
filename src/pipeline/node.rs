//! Node abstraction for the pipeline.
//!
//! Two-layer design:
//! - **`NodePlugin` trait**: the capability set every node implements
//!   (`start`, `on_data_received`, `tick`, `stop`); emitting goes through
//!   the [`NodeContext`].
//! - **`BuiltinNode` enum**: closed set of node kinds, dispatched with match
//!   arms so the worker loop needs no trait objects.
//!
//! Configuration happens at construction time (see
//! [`NodeFactory`](crate::pipeline::factory::NodeFactory)).

use crate::pipeline::emitter::Emitter;
use crate::pipeline::error::PipelineResult;
use crate::pipeline::id::NodeId;
use crate::pipeline::node_type::NodeKind;
use crate::pipeline::nodes::{
    ApplicationNode, BroadbandSourceNode, DiskWriterNode, OpticalStimulationNode,
    SpectralFilterNode, SpikeBinnerNode, SpikeDetectorNode, SpikeSourceNode, StreamInNode,
    StreamOutNode,
};
use crate::pipeline::record::Record;
use crossbeam_channel::Receiver;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Handed to a node for the lifetime of one run.
#[derive(Debug, Clone)]
pub struct NodeContext {
    id: NodeId,
    emitter: Emitter,
    running: Arc<AtomicBool>,
}

impl NodeContext {
    pub fn new(id: NodeId, emitter: Emitter, running: Arc<AtomicBool>) -> Self {
        Self {
            id,
            emitter,
            running,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Forward a record to every downstream node.
    pub fn emit(&self, record: Record) -> usize {
        self.emitter.emit(record)
    }

    pub fn is_connected(&self) -> bool {
        self.emitter.is_connected()
    }

    /// False once the device has been asked to stop.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

/// Capabilities shared by every node.
pub trait NodePlugin: Send {
    fn kind(&self) -> NodeKind;

    /// Local address of the node's socket, if it owns one.
    fn socket_addr(&self) -> Option<SocketAddr> {
        None
    }

    /// Period of [`tick`](Self::tick); `None` for purely reactive nodes.
    /// `Some(Duration::ZERO)` ticks continuously, for nodes whose tick blocks
    /// on a socket with its own timeout.
    fn tick_interval(&self) -> Option<Duration> {
        None
    }

    /// Called on the control thread before the worker is spawned.
    /// An error excludes the node from the run.
    fn start(&mut self, _ctx: &NodeContext) -> PipelineResult<()> {
        Ok(())
    }

    /// Called on the worker for each record from upstream.
    fn on_data_received(&mut self, record: Record, ctx: &NodeContext);

    fn tick(&mut self, _ctx: &NodeContext) -> PipelineResult<()> {
        Ok(())
    }

    /// Called on the control thread after the worker has been joined.
    fn stop(&mut self) {}
}

/// Enum dispatch for built-in nodes.
pub enum BuiltinNode {
    BroadbandSource(BroadbandSourceNode),
    SpikeSource(SpikeSourceNode),
    SpectralFilter(SpectralFilterNode),
    SpikeDetector(SpikeDetectorNode),
    SpikeBinner(SpikeBinnerNode),
    StreamIn(StreamInNode),
    StreamOut(StreamOutNode),
    OpticalStimulation(OpticalStimulationNode),
    DiskWriter(DiskWriterNode),
    Application(ApplicationNode),
}

impl BuiltinNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            BuiltinNode::BroadbandSource(n) => n.kind(),
            BuiltinNode::SpikeSource(n) => n.kind(),
            BuiltinNode::SpectralFilter(n) => n.kind(),
            BuiltinNode::SpikeDetector(n) => n.kind(),
            BuiltinNode::SpikeBinner(n) => n.kind(),
            BuiltinNode::StreamIn(n) => n.kind(),
            BuiltinNode::StreamOut(n) => n.kind(),
            BuiltinNode::OpticalStimulation(n) => n.kind(),
            BuiltinNode::DiskWriter(n) => n.kind(),
            BuiltinNode::Application(n) => n.kind(),
        }
    }

    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match self {
            BuiltinNode::BroadbandSource(n) => n.socket_addr(),
            BuiltinNode::SpikeSource(n) => n.socket_addr(),
            BuiltinNode::SpectralFilter(n) => n.socket_addr(),
            BuiltinNode::SpikeDetector(n) => n.socket_addr(),
            BuiltinNode::SpikeBinner(n) => n.socket_addr(),
            BuiltinNode::StreamIn(n) => n.socket_addr(),
            BuiltinNode::StreamOut(n) => n.socket_addr(),
            BuiltinNode::OpticalStimulation(n) => n.socket_addr(),
            BuiltinNode::DiskWriter(n) => n.socket_addr(),
            BuiltinNode::Application(n) => n.socket_addr(),
        }
    }

    pub fn tick_interval(&self) -> Option<Duration> {
        match self {
            BuiltinNode::BroadbandSource(n) => n.tick_interval(),
            BuiltinNode::SpikeSource(n) => n.tick_interval(),
            BuiltinNode::SpectralFilter(n) => n.tick_interval(),
            BuiltinNode::SpikeDetector(n) => n.tick_interval(),
            BuiltinNode::SpikeBinner(n) => n.tick_interval(),
            BuiltinNode::StreamIn(n) => n.tick_interval(),
            BuiltinNode::StreamOut(n) => n.tick_interval(),
            BuiltinNode::OpticalStimulation(n) => n.tick_interval(),
            BuiltinNode::DiskWriter(n) => n.tick_interval(),
            BuiltinNode::Application(n) => n.tick_interval(),
        }
    }

    pub fn start(&mut self, ctx: &NodeContext) -> PipelineResult<()> {
        match self {
            BuiltinNode::BroadbandSource(n) => n.start(ctx),
            BuiltinNode::SpikeSource(n) => n.start(ctx),
            BuiltinNode::SpectralFilter(n) => n.start(ctx),
            BuiltinNode::SpikeDetector(n) => n.start(ctx),
            BuiltinNode::SpikeBinner(n) => n.start(ctx),
            BuiltinNode::StreamIn(n) => n.start(ctx),
            BuiltinNode::StreamOut(n) => n.start(ctx),
            BuiltinNode::OpticalStimulation(n) => n.start(ctx),
            BuiltinNode::DiskWriter(n) => n.start(ctx),
            BuiltinNode::Application(n) => n.start(ctx),
        }
    }

    pub fn on_data_received(&mut self, record: Record, ctx: &NodeContext) {
        match self {
            BuiltinNode::BroadbandSource(n) => n.on_data_received(record, ctx),
            BuiltinNode::SpikeSource(n) => n.on_data_received(record, ctx),
            BuiltinNode::SpectralFilter(n) => n.on_data_received(record, ctx),
            BuiltinNode::SpikeDetector(n) => n.on_data_received(record, ctx),
            BuiltinNode::SpikeBinner(n) => n.on_data_received(record, ctx),
            BuiltinNode::StreamIn(n) => n.on_data_received(record, ctx),
            BuiltinNode::StreamOut(n) => n.on_data_received(record, ctx),
            BuiltinNode::OpticalStimulation(n) => n.on_data_received(record, ctx),
            BuiltinNode::DiskWriter(n) => n.on_data_received(record, ctx),
            BuiltinNode::Application(n) => n.on_data_received(record, ctx),
        }
    }

    pub fn tick(&mut self, ctx: &NodeContext) -> PipelineResult<()> {
        match self {
            BuiltinNode::BroadbandSource(n) => n.tick(ctx),
            BuiltinNode::SpikeSource(n) => n.tick(ctx),
            BuiltinNode::SpectralFilter(n) => n.tick(ctx),
            BuiltinNode::SpikeDetector(n) => n.tick(ctx),
            BuiltinNode::SpikeBinner(n) => n.tick(ctx),
            BuiltinNode::StreamIn(n) => n.tick(ctx),
            BuiltinNode::StreamOut(n) => n.tick(ctx),
            BuiltinNode::OpticalStimulation(n) => n.tick(ctx),
            BuiltinNode::DiskWriter(n) => n.tick(ctx),
            BuiltinNode::Application(n) => n.tick(ctx),
        }
    }

    pub fn stop(&mut self) {
        match self {
            BuiltinNode::BroadbandSource(n) => n.stop(),
            BuiltinNode::SpikeSource(n) => n.stop(),
            BuiltinNode::SpectralFilter(n) => n.stop(),
            BuiltinNode::SpikeDetector(n) => n.stop(),
            BuiltinNode::SpikeBinner(n) => n.stop(),
            BuiltinNode::StreamIn(n) => n.stop(),
            BuiltinNode::StreamOut(n) => n.stop(),
            BuiltinNode::OpticalStimulation(n) => n.stop(),
            BuiltinNode::DiskWriter(n) => n.stop(),
            BuiltinNode::Application(n) => n.stop(),
        }
    }

    /// Host-side receiver for application sinks.
    pub fn tap(&self) -> Option<Receiver<Record>> {
        match self {
            BuiltinNode::Application(n) => Some(n.subscribe()),
            _ => None,
        }
    }
}
