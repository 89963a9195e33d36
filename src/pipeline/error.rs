//! Pipeline-specific error types.

use crate::ndtp::NdtpError;
use crate::pipeline::id::NodeId;
use crate::pipeline::status::DeviceState;
use thiserror::Error;

/// Errors that can occur within the pipeline system.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Node {node_id} has unknown type '{kind}'")]
    UnknownKind { node_id: NodeId, kind: String },

    #[error("Node {node_id} has invalid configuration: {reason}")]
    InvalidConfig { node_id: NodeId, reason: String },

    #[error("Node {node_id} failed to configure: {reason}")]
    Configure { node_id: NodeId, reason: String },

    #[error("Node {node_id} transport error: {source}")]
    Transport {
        node_id: NodeId,
        #[source]
        source: std::io::Error,
    },

    #[error("Node {node_id}: {feature} is not implemented")]
    Unimplemented {
        node_id: NodeId,
        feature: &'static str,
    },

    #[error("Unknown node {0}")]
    UnknownNode(NodeId),

    #[error("Connection {src} -> {dst} references a node that is not installed")]
    MissingEndpoint { src: NodeId, dst: NodeId },

    #[error("Cannot {operation} while device is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: DeviceState,
    },

    #[error("Codec error: {0}")]
    Codec(#[from] NdtpError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn transport(node_id: NodeId, source: std::io::Error) -> Self {
        PipelineError::Transport { node_id, source }
    }

    pub fn invalid_config(node_id: NodeId, reason: impl Into<String>) -> Self {
        PipelineError::InvalidConfig {
            node_id,
            reason: reason.into(),
        }
    }

    /// Node the error is attributed to, if any.
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            PipelineError::UnknownKind { node_id, .. }
            | PipelineError::InvalidConfig { node_id, .. }
            | PipelineError::Configure { node_id, .. }
            | PipelineError::Transport { node_id, .. }
            | PipelineError::Unimplemented { node_id, .. } => Some(*node_id),
            PipelineError::UnknownNode(id) => Some(*id),
            PipelineError::MissingEndpoint { src, .. } => Some(*src),
            _ => None,
        }
    }

    /// Transport failures exclude a node instead of aborting reconfiguration.
    pub fn is_transport(&self) -> bool {
        matches!(self, PipelineError::Transport { .. })
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
