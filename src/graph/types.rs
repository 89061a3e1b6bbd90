//! Core identifier types for the graph layer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a node.
///
/// Ids are allocated monotonically per namespace and never reused. The
/// `Display` form is the plain decimal rendering, which is also the string
/// encoding used in keys and set members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    pub fn new(id: u64) -> Self {
        NodeId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        NodeId(id)
    }
}

/// Unique identifier for an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

impl EdgeId {
    pub fn new(id: u64) -> Self {
        EdgeId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EdgeId {
    fn from(id: u64) -> Self {
        EdgeId(id)
    }
}

/// The two entity kinds sharing one namespace.
///
/// Nodes and edges have independent id counters, membership sets and index
/// families; the kind selects which family a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Node,
    Edge,
}

impl EntityKind {
    /// Short tag used in key paths (`n` / `e`).
    pub fn tag(self) -> &'static str {
        match self {
            EntityKind::Node => "n",
            EntityKind::Edge => "e",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Node => write!(f, "node"),
            EntityKind::Edge => write!(f, "edge"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id() {
        let id = NodeId::new(42);
        assert_eq!(id.as_u64(), 42);
        assert_eq!(format!("{}", id), "42");

        let id2: NodeId = 100.into();
        assert_eq!(id2.as_u64(), 100);
    }

    #[test]
    fn test_edge_id() {
        let id = EdgeId::new(99);
        assert_eq!(id.as_u64(), 99);
        assert_eq!(format!("{}", id), "99");
    }

    #[test]
    fn test_id_ordering() {
        assert!(NodeId::new(1) < NodeId::new(2));
        assert!(EdgeId::new(7) < EdgeId::new(70));
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(EntityKind::Node.tag(), "n");
        assert_eq!(EntityKind::Edge.tag(), "e");
        assert_eq!(format!("{}", EntityKind::Node), "node");
    }
}
