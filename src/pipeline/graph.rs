//! Graph descriptions: nodes with kind-specific configuration, and the
//! directed connections between them.
//!
//! The JSON form is what the control plane hands to a device:
//!
//! ```json
//! {
//!   "nodes": [
//!     { "id": 1, "type": "broadband_source", "config": { "channel_ids": [0, 1] } },
//!     { "id": 2, "type": "stream_out", "config": { "multicast_group": "239.0.0.115" } }
//!   ],
//!   "connections": [ { "src": 1, "dst": 2 } ]
//! }
//! ```

use crate::error::{DataPlaneError, Result, ResultExt};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::NodeId;
use crate::pipeline::node_type::NodeKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Typed configuration for one node kind.
pub trait NodeConfig: Serialize {
    const KIND: NodeKind;
}

/// One node in a graph description. `kind` stays a string until the graph is
/// installed so unknown kinds can be reported against their node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub src: NodeId,
    pub dst: NodeId,
}

/// A node graph. Ids are assigned sequentially from 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    nodes: Vec<NodeSpec>,
    #[serde(default)]
    connections: Vec<Connection>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> PipelineResult<NodeId> {
        let last = self
            .nodes
            .iter()
            .map(|n| n.id)
            .max()
            .unwrap_or(NodeId::INVALID);
        last.checked_next()
            .ok_or_else(|| PipelineError::invalid_config(last, "no node ids left after this one"))
    }

    /// Add a node with typed configuration.
    pub fn add<C: NodeConfig>(&mut self, config: &C) -> PipelineResult<NodeId> {
        let id = self.next_id()?;
        let value =
            serde_json::to_value(config).map_err(|e| PipelineError::invalid_config(id, e.to_string()))?;
        self.add_raw(C::KIND.as_str(), value)
    }

    /// Add a node by kind name. The kind is not checked until configure.
    pub fn add_raw(
        &mut self,
        kind: impl Into<String>,
        config: serde_json::Value,
    ) -> PipelineResult<NodeId> {
        let id = self.next_id()?;
        self.nodes.push(NodeSpec {
            id,
            kind: kind.into(),
            config,
        });
        Ok(id)
    }

    /// Connect `src` to `dst`. Both must already be in this graph.
    pub fn connect(&mut self, src: NodeId, dst: NodeId) -> PipelineResult<()> {
        for id in [src, dst] {
            if self.node(id).is_none() {
                return Err(PipelineError::UnknownNode(id));
            }
        }
        self.connections.push(Connection { src, dst });
        Ok(())
    }

    pub fn nodes(&self) -> &[NodeSpec] {
        &self.nodes
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check id uniqueness and that every connection references a known node.
    pub fn validate(&self) -> PipelineResult<()> {
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !node.id.is_valid() || !seen.insert(node.id) {
                return Err(PipelineError::invalid_config(
                    node.id,
                    "node ids must be unique and non-zero",
                ));
            }
        }
        for conn in &self.connections {
            for id in [conn.src, conn.dst] {
                if !seen.contains(&id) {
                    return Err(PipelineError::UnknownNode(id));
                }
            }
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            DataPlaneError::Serialization(format!("Failed to parse graph description: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            DataPlaneError::Serialization(format!("Failed to serialize graph description: {}", e))
        })
    }

    /// Load a graph description from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read graph file {:?}", path))?;
        Self::from_json(&content).with_context(|| format!("Invalid graph file {:?}", path))
    }

    /// Save the graph description to disk as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DataPlaneError::Config(format!("Failed to create graph directory: {}", e))
            })?;
        }
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write graph file {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ids_are_sequential_from_one() {
        let mut config = Config::new();
        assert_eq!(config.add_raw("application", json!({})).unwrap(), NodeId(1));
        assert_eq!(config.add_raw("application", json!({})).unwrap(), NodeId(2));
        assert_eq!(config.add_raw("application", json!({})).unwrap(), NodeId(3));
    }

    #[test]
    fn test_connect_requires_known_ids() {
        let mut config = Config::new();
        let a = config.add_raw("spike_source", json!({})).unwrap();
        let b = config.add_raw("application", json!({})).unwrap();
        assert!(config.connect(a, b).is_ok());
        assert!(matches!(
            config.connect(a, NodeId(9)),
            Err(PipelineError::UnknownNode(NodeId(9)))
        ));
        assert_eq!(config.connections(), &[Connection { src: a, dst: b }]);
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{
            "nodes": [
                {"id": 1, "type": "spike_source", "config": {"channel_count": 4}},
                {"id": 2, "type": "application"}
            ],
            "connections": [{"src": 1, "dst": 2}]
        }"#;
        let config = Config::from_json(json).unwrap();
        assert_eq!(config.nodes().len(), 2);
        assert_eq!(config.nodes()[1].config, serde_json::Value::Null);

        let reparsed = Config::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn test_json_rejects_dangling_connection() {
        let json = r#"{"nodes": [{"id": 1, "type": "application"}],
                       "connections": [{"src": 1, "dst": 5}]}"#;
        assert!(Config::from_json(json).is_err());
    }

    #[test]
    fn test_json_rejects_duplicate_ids() {
        let json = r#"{"nodes": [{"id": 1, "type": "application"},
                                 {"id": 1, "type": "application"}]}"#;
        assert!(Config::from_json(json).is_err());
    }

    #[test]
    fn test_add_after_max_id_fails() {
        let json = r#"{"nodes": [{"id": 4294967295, "type": "application"}]}"#;
        let mut config = Config::from_json(json).unwrap();
        let err = config.add_raw("application", json!({})).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidConfig { node_id: NodeId(u32::MAX), .. }
        ));
        assert_eq!(config.nodes().len(), 1);
    }
}
