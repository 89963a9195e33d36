//! ApplicationNode: hands records to host code.
//!
//! Host code subscribes to a bounded queue. When it falls behind, the oldest
//! queued records are discarded so the pipeline never waits on it.

use crate::config::DEFAULT_INBOX_CAPACITY;
use crate::pipeline::error::PipelineResult;
use crate::pipeline::factory::ConfigureEnv;
use crate::pipeline::graph::NodeConfig;
use crate::pipeline::id::NodeId;
use crate::pipeline::node::{NodeContext, NodePlugin};
use crate::pipeline::node_type::NodeKind;
use crate::pipeline::queue::{inbox, InboxPolicy, InboxSender};
use crate::pipeline::record::Record;
use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    pub capacity: usize,
    /// Emit received records downstream as well.
    pub forward: bool,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_INBOX_CAPACITY,
            forward: false,
        }
    }
}

impl NodeConfig for ApplicationConfig {
    const KIND: NodeKind = NodeKind::Application;
}

pub struct ApplicationNode {
    id: NodeId,
    forward: bool,
    tap: InboxSender,
    rx: Receiver<Record>,
}

impl ApplicationNode {
    pub fn configure(config: ApplicationConfig, env: &mut ConfigureEnv) -> PipelineResult<Self> {
        let (tap, rx) = inbox(
            env.node_id,
            config.capacity,
            InboxPolicy::DropOldest,
            Duration::ZERO,
        );
        Ok(Self {
            id: env.node_id,
            forward: config.forward,
            tap,
            rx,
        })
    }

    /// Receiver for host code. Every subscriber draws from the same queue.
    pub fn subscribe(&self) -> Receiver<Record> {
        self.rx.clone()
    }

    /// Records discarded because no one drained the tap in time.
    pub fn dropped(&self) -> u64 {
        self.tap.dropped()
    }
}

impl NodePlugin for ApplicationNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Application
    }

    fn on_data_received(&mut self, record: Record, ctx: &NodeContext) {
        if self.forward {
            ctx.emit(record.clone());
        }
        self.tap.deliver(record);
    }

    fn stop(&mut self) {
        let dropped = self.dropped();
        if dropped > 0 {
            tracing::info!("Application tap {} dropped {} records", self.id, dropped);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportSettings;
    use crate::ndtp::SpiketrainFrame;
    use crate::pipeline::emitter::Emitter;
    use crate::pipeline::factory::PortAllocator;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[test]
    fn test_tap_keeps_newest() {
        let transport = TransportSettings::default();
        let mut ports = PortAllocator::new(0);
        let mut env = ConfigureEnv {
            node_id: NodeId(9),
            transport: &transport,
            ports: &mut ports,
        };
        let mut node = ApplicationNode::configure(
            ApplicationConfig {
                capacity: 2,
                forward: false,
            },
            &mut env,
        )
        .unwrap();
        let rx = node.subscribe();
        let ctx = NodeContext::new(NodeId(9), Emitter::default(), Arc::new(AtomicBool::new(true)));

        for ts in 0..4 {
            node.on_data_received(
                Record::from(SpiketrainFrame {
                    timestamp_ns: ts,
                    bin_size_ms: 1,
                    spike_counts: vec![],
                }),
                &ctx,
            );
        }
        let seen: Vec<i64> = rx.try_iter().map(|r| r.timestamp_ns()).collect();
        assert_eq!(seen, vec![2, 3]);
        assert_eq!(node.dropped(), 2);
    }
}
