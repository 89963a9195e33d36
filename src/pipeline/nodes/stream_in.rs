//! StreamInNode: receives NDTP datagrams and emits the decoded records.
//!
//! Each tick blocks on the socket for at most the socket poll timeout, so a
//! stop request is seen within about a second even on an idle link.

use crate::config::MAX_DATAGRAM_SIZE;
use crate::ndtp::Depacketizer;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::factory::ConfigureEnv;
use crate::pipeline::graph::NodeConfig;
use crate::pipeline::id::NodeId;
use crate::pipeline::node::{NodeContext, NodePlugin};
use crate::pipeline::node_type::NodeKind;
use crate::pipeline::record::Record;
use crate::transport::monitor::{PacketMonitor, SequenceSpace};
use crate::transport::socket::{bind_receiver, is_timeout};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamInConfig {
    pub bind: SocketAddrV4,
    pub multicast_group: Option<Ipv4Addr>,
    /// Receive buffer to request; the device default when unset.
    pub receive_buffer_bytes: Option<usize>,
    /// Score sequences with the legacy 2^16 + 1 modulus.
    pub legacy_sequence_space: bool,
}

impl Default for StreamInConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0),
            multicast_group: None,
            receive_buffer_bytes: None,
            legacy_sequence_space: false,
        }
    }
}

impl NodeConfig for StreamInConfig {
    const KIND: NodeKind = NodeKind::StreamIn;
}

pub struct StreamInNode {
    id: NodeId,
    socket: UdpSocket,
    depacketizer: Depacketizer,
    monitor: PacketMonitor,
    buf: Vec<u8>,
}

impl StreamInNode {
    pub fn configure(config: StreamInConfig, env: &mut ConfigureEnv) -> PipelineResult<Self> {
        let id = env.node_id;
        let socket = bind_receiver(
            config.bind,
            config.multicast_group,
            env.transport.iface_ip,
            config
                .receive_buffer_bytes
                .unwrap_or(env.transport.receive_buffer_bytes),
        )
        .map_err(|e| PipelineError::transport(id, e))?;

        let space = if config.legacy_sequence_space {
            SequenceSpace::Legacy
        } else {
            SequenceSpace::Wire
        };
        tracing::info!(
            "Stream in {} listening on {:?}",
            id,
            socket.local_addr().ok()
        );
        Ok(Self {
            id,
            socket,
            depacketizer: Depacketizer::new(),
            monitor: PacketMonitor::new(space, env.transport.report_interval()),
            buf: vec![0u8; MAX_DATAGRAM_SIZE],
        })
    }

    pub fn monitor(&self) -> &PacketMonitor {
        &self.monitor
    }
}

impl NodePlugin for StreamInNode {
    fn kind(&self) -> NodeKind {
        NodeKind::StreamIn
    }

    fn socket_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }

    fn tick_interval(&self) -> Option<Duration> {
        Some(Duration::ZERO)
    }

    fn on_data_received(&mut self, _record: Record, _ctx: &NodeContext) {
        tracing::debug!("Stream in {} ignores upstream records", self.id);
    }

    fn tick(&mut self, ctx: &NodeContext) -> PipelineResult<()> {
        let len = match self.socket.recv_from(&mut self.buf) {
            Ok((n, _peer)) => n,
            Err(e) if is_timeout(e.kind()) => return Ok(()),
            Err(e) => return Err(PipelineError::transport(self.id, e)),
        };

        self.monitor.record_bytes(len);
        self.depacketizer.push(&self.buf[..len]);
        while let Some(message) = self.depacketizer.next_message() {
            self.monitor.process(message.header.sequence);
            ctx.emit(Record::from(message));
        }

        if let Some(report) = self.monitor.maybe_report() {
            tracing::info!("Stream in {}: {}", self.id, report);
        }
        Ok(())
    }

    fn stop(&mut self) {
        let stats = self.depacketizer.stats();
        tracing::info!(
            "Stream in {} stopped: {} messages, {} dropped, {} out of order, {} frames discarded",
            self.id,
            self.monitor.packet_count(),
            self.monitor.dropped_count(),
            self.monitor.out_of_order_count(),
            stats.frames_discarded
        );
    }
}
