//! Identity types for the pipeline system.
//!
//! Node ids are assigned by [`Config`](crate::pipeline::Config) sequentially
//! starting at 1 and never change once assigned.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a node within one graph.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Never assigned to a node.
    pub const INVALID: NodeId = NodeId(0);

    pub const FIRST: NodeId = NodeId(1);

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    /// The following id, or `None` once ids are exhausted.
    #[inline]
    pub fn checked_next(self) -> Option<NodeId> {
        self.0.checked_add(1).map(NodeId)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "NodeId(INVALID)")
        } else {
            write!(f, "NodeId({})", self.0)
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id() {
        let id = NodeId(42);
        assert!(id.is_valid());
        assert_eq!(id.checked_next(), Some(NodeId(43)));
        assert_eq!(NodeId(u32::MAX).checked_next(), None);
        assert!(!NodeId::INVALID.is_valid());
        assert!(NodeId::FIRST.is_valid());
    }

    #[test]
    fn test_node_id_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&NodeId(7)).unwrap(), "7");
        assert_eq!(serde_json::from_str::<NodeId>("3").unwrap(), NodeId(3));
    }
}
