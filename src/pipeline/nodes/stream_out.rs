//! StreamOutNode: encodes records and sends them as NDTP datagrams.
//!
//! Binds `iface_ip:port` where the port defaults to the next one handed out
//! for stream outputs. Sends either to a multicast group (on the same port)
//! or to an explicit unicast destination.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::factory::ConfigureEnv;
use crate::pipeline::graph::NodeConfig;
use crate::pipeline::id::NodeId;
use crate::pipeline::node::{NodeContext, NodePlugin};
use crate::pipeline::node_type::NodeKind;
use crate::pipeline::record::Record;
use crate::transport::socket::bind_sender;
use crate::transport::writer::send_record;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamOutConfig {
    /// Local interface; the device's transport interface when unset.
    pub iface_ip: Option<Ipv4Addr>,
    /// Local port; allocated per instance when unset.
    pub port: Option<u16>,
    pub multicast_group: Option<Ipv4Addr>,
    /// Unicast target, used when no multicast group is set.
    pub destination: Option<SocketAddr>,
}

impl NodeConfig for StreamOutConfig {
    const KIND: NodeKind = NodeKind::StreamOut;
}

pub struct StreamOutNode {
    id: NodeId,
    socket: UdpSocket,
    destination: SocketAddr,
    sequence: u16,
    datagrams_sent: u64,
    send_failures: u64,
}

impl StreamOutNode {
    pub fn configure(config: StreamOutConfig, env: &mut ConfigureEnv) -> PipelineResult<Self> {
        let id = env.node_id;
        if config.multicast_group.is_none() && config.destination.is_none() {
            return Err(PipelineError::invalid_config(
                id,
                "stream output needs a multicast_group or a destination",
            ));
        }
        if let Some(group) = config.multicast_group {
            if !group.is_multicast() {
                return Err(PipelineError::invalid_config(
                    id,
                    format!("{} is not a multicast address", group),
                ));
            }
        }

        let iface = config.iface_ip.unwrap_or(env.transport.iface_ip);
        let port = config
            .port
            .unwrap_or_else(|| env.ports.next_port(NodeKind::StreamOut));
        let socket = bind_sender(
            iface,
            port,
            config.multicast_group,
            env.transport.multicast_ttl,
        )
        .map_err(|e| PipelineError::transport(id, e))?;
        let local = socket
            .local_addr()
            .map_err(|e| PipelineError::transport(id, e))?;

        let destination = match (config.multicast_group, config.destination) {
            (Some(group), _) => SocketAddr::V4(SocketAddrV4::new(group, local.port())),
            (None, Some(destination)) => destination,
            (None, None) => return Err(PipelineError::invalid_config(id, "no destination")),
        };

        tracing::info!(
            "Stream out {} bound to {}, sending to {}",
            id,
            local,
            destination
        );
        Ok(Self {
            id,
            socket,
            destination,
            sequence: 0,
            datagrams_sent: 0,
            send_failures: 0,
        })
    }
}

impl NodePlugin for StreamOutNode {
    fn kind(&self) -> NodeKind {
        NodeKind::StreamOut
    }

    fn socket_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }

    fn on_data_received(&mut self, record: Record, _ctx: &NodeContext) {
        match send_record(&self.socket, self.destination, &record, &mut self.sequence) {
            Ok(outcome) => {
                self.datagrams_sent += outcome.sent as u64;
                if outcome.failed > 0 {
                    self.send_failures += outcome.failed as u64;
                    tracing::warn!(
                        "Stream out {}: {} datagrams failed to send ({} total)",
                        self.id,
                        outcome.failed,
                        self.send_failures
                    );
                }
            }
            Err(e) => tracing::warn!("Stream out {}: dropping record: {}", self.id, e),
        }
    }

    fn stop(&mut self) {
        tracing::info!(
            "Stream out {} stopped: {} datagrams sent, {} failed, next sequence {}",
            self.id,
            self.datagrams_sent,
            self.send_failures,
            self.sequence
        );
    }
}
