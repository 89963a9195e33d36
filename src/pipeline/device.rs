//! Device runtime: installs a graph, runs one worker thread per node, and
//! tears everything down on stop or reconfiguration.
//!
//! # Worker loop
//!
//! Each worker waits on its node's inbox until the next tick is due (or for
//! [`IDLE_POLL`] when the node does not tick), hands any record to
//! `on_data_received`, and calls `tick` when due. The stop flag is checked
//! every iteration. Joining a worker returns the node, so a stopped graph
//! can be started again without reconfiguring.

use crate::config::{DeviceSettings, TransportSettings};
use crate::pipeline::emitter::Emitter;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::factory::{NodeFactory, PortAllocator};
use crate::pipeline::graph::Config;
use crate::pipeline::id::NodeId;
use crate::pipeline::node::{BuiltinNode, NodeContext};
use crate::pipeline::node_type::NodeKind;
use crate::pipeline::queue::{inbox, InboxSender};
use crate::pipeline::record::Record;
use crate::pipeline::status::{DeviceState, Status};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Inbox wait for nodes without a tick interval.
pub const IDLE_POLL: Duration = Duration::from_millis(100);

/// A node socket as reported to the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SocketEntry {
    pub node_id: NodeId,
    pub kind: NodeKind,
    pub addr: SocketAddr,
}

/// Snapshot returned by [`Device::info`].
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub name: String,
    pub serial: String,
    pub state: DeviceState,
    pub configuration: Config,
    pub sockets: Vec<SocketEntry>,
    /// Nodes left out of the installed graph, with the reason.
    pub excluded: Vec<Status>,
}

struct Slot {
    id: NodeId,
    kind: NodeKind,
    /// `None` while a worker owns the node.
    node: Option<BuiltinNode>,
    inbox_tx: InboxSender,
    inbox_rx: Receiver<Record>,
    emitter: Emitter,
    socket: Option<SocketAddr>,
    tap: Option<Receiver<Record>>,
    worker: Option<JoinHandle<BuiltinNode>>,
}

pub struct Device {
    settings: DeviceSettings,
    transport: TransportSettings,
    state: DeviceState,
    configuration: Config,
    slots: Vec<Slot>,
    excluded: Vec<Status>,
    ports: PortAllocator,
    running: Arc<AtomicBool>,
}

impl Device {
    pub fn new(settings: DeviceSettings, transport: TransportSettings) -> Self {
        let ports = PortAllocator::new(transport.base_port);
        Self {
            settings,
            transport,
            state: DeviceState::Stopped,
            configuration: Config::new(),
            slots: Vec::new(),
            excluded: Vec::new(),
            ports,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_config(config: &crate::config::DataPlaneConfig) -> Self {
        Self::new(config.device.clone(), config.transport.clone())
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// The installed graph; empty after a failed configure.
    pub fn configuration(&self) -> &Config {
        &self.configuration
    }

    pub fn excluded(&self) -> &[Status] {
        &self.excluded
    }

    pub fn sockets(&self) -> Vec<SocketEntry> {
        self.slots
            .iter()
            .filter_map(|slot| {
                slot.socket.map(|addr| SocketEntry {
                    node_id: slot.id,
                    kind: slot.kind,
                    addr,
                })
            })
            .collect()
    }

    pub fn info(&self) -> DeviceInfo {
        DeviceInfo {
            name: self.settings.name.clone(),
            serial: self.settings.serial.clone(),
            state: self.state,
            configuration: self.configuration.clone(),
            sockets: self.sockets(),
            excluded: self.excluded.clone(),
        }
    }

    /// Host-side receiver of an application node.
    pub fn tap(&self, id: NodeId) -> PipelineResult<Receiver<Record>> {
        let slot = self.slot(id)?;
        slot.tap.clone().ok_or_else(|| PipelineError::InvalidConfig {
            node_id: id,
            reason: format!("{} nodes have no tap", slot.kind),
        })
    }

    /// Push a record into a node's inbox as if an upstream node emitted it.
    pub fn send_to(&self, id: NodeId, record: Record) -> PipelineResult<bool> {
        Ok(self.slot(id)?.inbox_tx.deliver(record))
    }

    fn slot(&self, id: NodeId) -> PipelineResult<&Slot> {
        self.slots
            .iter()
            .find(|slot| slot.id == id)
            .ok_or(PipelineError::UnknownNode(id))
    }

    /// Replace the installed graph. Stops a running device first.
    ///
    /// Nodes whose sockets cannot be set up are left out and reported; any
    /// other failure leaves no graph installed.
    pub fn configure(&mut self, config: Config) -> Status {
        match self.install(config) {
            Ok(()) => match self.excluded.first() {
                Some(status) => status.clone(),
                None => Status::ok(),
            },
            Err(e) => {
                tracing::error!("Configuration rejected: {}", e);
                Status::from(&e)
            }
        }
    }

    fn install(&mut self, config: Config) -> PipelineResult<()> {
        if self.state == DeviceState::Running {
            self.stop_workers();
        }
        self.state = DeviceState::Initializing;
        self.slots.clear();
        self.excluded.clear();
        self.configuration = Config::new();
        self.ports.reset();

        let result = self.build(&config);
        if let Err(e) = result {
            self.slots.clear();
            self.state = DeviceState::Stopped;
            return Err(e);
        }

        tracing::info!(
            "Installed graph: {} nodes, {} connections, {} excluded",
            self.slots.len(),
            config.connections().len(),
            self.excluded.len()
        );
        self.configuration = config;
        self.state = DeviceState::Stopped;
        Ok(())
    }

    fn build(&mut self, config: &Config) -> PipelineResult<()> {
        config.validate()?;

        for spec in config.nodes() {
            let node = match NodeFactory::create(spec, &self.transport, &mut self.ports) {
                Ok(node) => node,
                Err(e) if e.is_transport() => {
                    tracing::warn!("Excluding node {}: {}", spec.id, e);
                    self.excluded.push(Status::from(&e));
                    continue;
                }
                Err(e) => return Err(e),
            };
            let kind = node.kind();
            let (inbox_tx, inbox_rx) = inbox(
                spec.id,
                self.settings.inbox_capacity,
                kind.inbox_policy(),
                self.settings.inbox_timeout(),
            );
            self.slots.push(Slot {
                id: spec.id,
                kind,
                socket: node.socket_addr(),
                tap: node.tap(),
                node: Some(node),
                inbox_tx,
                inbox_rx,
                emitter: Emitter::default(),
                worker: None,
            });
        }

        let mut targets: HashMap<NodeId, Vec<InboxSender>> = HashMap::new();
        for conn in config.connections() {
            let missing = PipelineError::MissingEndpoint {
                src: conn.src,
                dst: conn.dst,
            };
            if self.slot(conn.src).is_err() {
                return Err(missing);
            }
            let dst = self.slot(conn.dst).map_err(|_| missing)?;
            targets
                .entry(conn.src)
                .or_default()
                .push(dst.inbox_tx.clone());
        }
        for slot in &mut self.slots {
            if let Some(senders) = targets.remove(&slot.id) {
                slot.emitter = Emitter::new(senders);
            }
        }
        Ok(())
    }

    /// Launch one worker per node. Nodes that fail to start are excluded.
    pub fn start(&mut self) -> Status {
        if self.state != DeviceState::Stopped {
            return Status::from(&PipelineError::InvalidState {
                operation: "start",
                state: self.state,
            });
        }
        self.running.store(true, Ordering::Relaxed);

        for slot in &mut self.slots {
            let Some(mut node) = slot.node.take() else {
                continue;
            };
            let ctx = NodeContext::new(slot.id, slot.emitter.clone(), Arc::clone(&self.running));
            if let Err(e) = node.start(&ctx) {
                tracing::warn!("Node {} failed to start, excluding: {}", slot.id, e);
                self.excluded.push(Status::from(&e));
                slot.node = Some(node);
                continue;
            }

            let inbox = slot.inbox_rx.clone();
            let spawned = thread::Builder::new()
                .name(format!("node-{}-{}", slot.id, slot.kind))
                .spawn(move || run_worker(node, inbox, ctx));
            match spawned {
                Ok(handle) => slot.worker = Some(handle),
                Err(e) => {
                    tracing::error!("Failed to spawn worker for node {}: {}", slot.id, e);
                    self.excluded.push(Status::from(&PipelineError::Io(e)));
                }
            }
        }

        self.state = DeviceState::Running;
        tracing::info!(
            "Device started: {} workers",
            self.slots.iter().filter(|s| s.worker.is_some()).count()
        );
        Status::ok()
    }

    /// Signal every worker, join them, and return to `Stopped`.
    pub fn stop(&mut self) -> Status {
        if self.state == DeviceState::Running {
            self.stop_workers();
            tracing::info!("Device stopped");
        }
        self.state = DeviceState::Stopped;
        Status::ok()
    }

    fn stop_workers(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        for slot in &mut self.slots {
            let Some(worker) = slot.worker.take() else {
                continue;
            };
            match worker.join() {
                Ok(mut node) => {
                    node.stop();
                    slot.node = Some(node);
                }
                Err(_) => tracing::error!("Worker for node {} panicked", slot.id),
            }
            let stale = slot.inbox_rx.try_iter().count();
            if stale > 0 {
                tracing::debug!("Discarded {} queued records for node {}", stale, slot.id);
            }
        }
        self.state = DeviceState::Stopped;
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if self.state == DeviceState::Running {
            self.stop_workers();
        }
    }
}

fn run_worker(mut node: BuiltinNode, inbox: Receiver<Record>, ctx: NodeContext) -> BuiltinNode {
    let interval = node.tick_interval();
    let mut next_tick = interval.map(|_| Instant::now());

    while ctx.is_running() {
        let wait = match next_tick {
            Some(at) => at.saturating_duration_since(Instant::now()).min(IDLE_POLL),
            None => IDLE_POLL,
        };
        match inbox.recv_timeout(wait) {
            Ok(record) => node.on_data_received(record, &ctx),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if let (Some(at), Some(period)) = (next_tick, interval) {
            let now = Instant::now();
            if now >= at {
                if let Err(e) = node.tick(&ctx) {
                    tracing::warn!("Node {} tick failed: {}", ctx.id(), e);
                }
                next_tick = Some((at + period).max(now));
            }
        }
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ndtp::SpiketrainFrame;
    use crate::pipeline::nodes::{ApplicationConfig, SpikeBinnerConfig};
    use crate::pipeline::status::StatusCode;
    use serde_json::json;

    fn device() -> Device {
        let transport = TransportSettings {
            base_port: 0,
            ..Default::default()
        };
        Device::new(DeviceSettings::default(), transport)
    }

    #[test]
    fn test_unknown_kind_aborts() {
        let mut device = device();
        let mut config = Config::new();
        config.add(&ApplicationConfig::default()).unwrap();
        let bad = config.add_raw("flux_capacitor", json!({})).unwrap();

        let status = device.configure(config);
        assert_eq!(status.code, StatusCode::InvalidConfiguration);
        assert_eq!(status.node_id, Some(bad));
        assert!(device.configuration().is_empty());
        assert!(device.sockets().is_empty());
        assert_eq!(device.state(), DeviceState::Stopped);
    }

    #[test]
    fn test_start_twice_is_invalid() {
        let mut device = device();
        let mut config = Config::new();
        config.add(&ApplicationConfig::default()).unwrap();
        assert!(device.configure(config).is_ok());
        assert!(device.start().is_ok());
        assert_eq!(device.start().code, StatusCode::InvalidState);
        assert!(device.stop().is_ok());
        assert_eq!(device.state(), DeviceState::Stopped);
    }

    #[test]
    fn test_injected_record_reaches_tap() {
        let mut device = device();
        let mut config = Config::new();
        let binner = config.add(&SpikeBinnerConfig { bin_size_ms: 20 }).unwrap();
        let app = config.add(&ApplicationConfig::default()).unwrap();
        config.connect(binner, app).unwrap();
        assert!(device.configure(config).is_ok());
        let tap = device.tap(app).unwrap();
        assert!(device.tap(binner).is_err());

        assert!(device.start().is_ok());
        device
            .send_to(
                binner,
                Record::from(SpiketrainFrame {
                    timestamp_ns: 42,
                    bin_size_ms: 20,
                    spike_counts: vec![1, 2, 3],
                }),
            )
            .unwrap();
        let record = tap.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(record.timestamp_ns(), 42);

        // Restart reuses the same nodes.
        assert!(device.stop().is_ok());
        assert!(device.start().is_ok());
        assert!(device.stop().is_ok());
    }
}
