//! Device lifecycle state and the status values reported to the control plane.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a [`Device`](crate::pipeline::Device).
///
/// `Stopped --configure--> Initializing --> Stopped --start--> Running --stop--> Stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceState {
    #[default]
    Stopped,
    Initializing,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    Ok,
    InvalidConfiguration,
    Unimplemented,
    TransportError,
    InvalidState,
    Internal,
}

/// Outcome of a configure/start/stop request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
    /// Node the failure is attributed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            code: StatusCode::Ok,
            message: String::new(),
            node_id: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }
}

impl From<&PipelineError> for Status {
    fn from(err: &PipelineError) -> Self {
        let code = match err {
            PipelineError::UnknownKind { .. }
            | PipelineError::InvalidConfig { .. }
            | PipelineError::Configure { .. }
            | PipelineError::UnknownNode(_)
            | PipelineError::MissingEndpoint { .. } => StatusCode::InvalidConfiguration,
            PipelineError::Unimplemented { .. } => StatusCode::Unimplemented,
            PipelineError::Transport { .. } => StatusCode::TransportError,
            PipelineError::InvalidState { .. } => StatusCode::InvalidState,
            PipelineError::Codec(_) | PipelineError::Io(_) => StatusCode::Internal,
        };
        Self {
            code,
            message: err.to_string(),
            node_id: err.node_id(),
        }
    }
}

impl<T> From<PipelineResult<T>> for Status {
    fn from(result: PipelineResult<T>) -> Self {
        match result {
            Ok(_) => Status::ok(),
            Err(e) => Status::from(&e),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{:?}", self.code)
        } else {
            write!(f, "{:?}: {}", self.code, self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_error() {
        let err = PipelineError::UnknownKind {
            node_id: NodeId(2),
            kind: "warp_drive".into(),
        };
        let status = Status::from(&err);
        assert_eq!(status.code, StatusCode::InvalidConfiguration);
        assert_eq!(status.node_id, Some(NodeId(2)));
        assert!(status.message.contains("warp_drive"));
    }

    #[test]
    fn test_status_from_result() {
        assert!(Status::from(Ok::<(), PipelineError>(())).is_ok());
        let status = Status::from(Err::<(), _>(PipelineError::Unimplemented {
            node_id: NodeId(1),
            feature: "template matching",
        }));
        assert_eq!(status.code, StatusCode::Unimplemented);
    }
}
