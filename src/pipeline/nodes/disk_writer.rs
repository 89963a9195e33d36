//! DiskWriterNode: appends records to a file as JSON lines.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::factory::ConfigureEnv;
use crate::pipeline::graph::NodeConfig;
use crate::pipeline::id::NodeId;
use crate::pipeline::node::{NodeContext, NodePlugin};
use crate::pipeline::node_type::NodeKind;
use crate::pipeline::record::Record;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskWriterConfig {
    pub path: PathBuf,
    /// Truncate instead of appending to an existing file.
    pub truncate: bool,
}

impl NodeConfig for DiskWriterConfig {
    const KIND: NodeKind = NodeKind::DiskWriter;
}

pub struct DiskWriterNode {
    id: NodeId,
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
    failed: u64,
}

impl DiskWriterNode {
    pub fn configure(config: DiskWriterConfig, env: &mut ConfigureEnv) -> PipelineResult<Self> {
        let id = env.node_id;
        if config.path.as_os_str().is_empty() {
            return Err(PipelineError::invalid_config(id, "no output path"));
        }
        let configure_err = |e: std::io::Error| PipelineError::Configure {
            node_id: id,
            reason: format!("{}: {}", config.path.display(), e),
        };

        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(configure_err)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(!config.truncate)
            .truncate(config.truncate)
            .open(&config.path)
            .map_err(configure_err)?;

        tracing::info!("Disk writer {} writing to {}", id, config.path.display());
        Ok(Self {
            id,
            path: config.path,
            writer: BufWriter::new(file),
            written: 0,
            failed: 0,
        })
    }

    fn write_record(&mut self, record: &Record) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")
    }
}

impl NodePlugin for DiskWriterNode {
    fn kind(&self) -> NodeKind {
        NodeKind::DiskWriter
    }

    fn tick_interval(&self) -> Option<Duration> {
        Some(FLUSH_INTERVAL)
    }

    fn on_data_received(&mut self, record: Record, _ctx: &NodeContext) {
        match self.write_record(&record) {
            Ok(()) => self.written += 1,
            Err(e) => {
                self.failed += 1;
                tracing::warn!("Disk writer {}: write to {} failed: {}", self.id, self.path.display(), e);
            }
        }
    }

    fn tick(&mut self, _ctx: &NodeContext) -> PipelineResult<()> {
        if let Err(e) = self.writer.flush() {
            tracing::warn!("Disk writer {}: flush failed: {}", self.id, e);
        }
        Ok(())
    }

    fn stop(&mut self) {
        if let Err(e) = self.writer.flush() {
            tracing::error!("Disk writer {}: final flush failed: {}", self.id, e);
        }
        tracing::info!(
            "Disk writer {} stopped: {} records written, {} failed",
            self.id,
            self.written,
            self.failed
        );
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
    use tempfile::TempDir;

    fn writer(config: DiskWriterConfig) -> PipelineResult<DiskWriterNode> {
        let transport = TransportSettings::default();
        let mut ports = PortAllocator::new(0);
        let mut env = ConfigureEnv {
            node_id: NodeId(6),
            transport: &transport,
            ports: &mut ports,
        };
        DiskWriterNode::configure(config, &mut env)
    }

    #[test]
    fn test_writes_json_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/out.jsonl");
        let mut node = writer(DiskWriterConfig {
            path: path.clone(),
            truncate: false,
        })
        .unwrap();
        let ctx = NodeContext::new(NodeId(6), Emitter::default(), Arc::new(AtomicBool::new(true)));

        for ts in 0..3 {
            node.on_data_received(
                Record::from(SpiketrainFrame {
                    timestamp_ns: ts,
                    bin_size_ms: 20,
                    spike_counts: vec![1, 2],
                }),
                &ctx,
            );
        }
        node.stop();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2]["kind"], "spiketrain");
        assert_eq!(lines[2]["frame"]["timestamp_ns"], 2);
    }

    #[test]
    fn test_empty_path_rejected() {
        let result = writer(DiskWriterConfig::default());
        assert!(matches!(result, Err(PipelineError::InvalidConfig { .. })));
    }
}
