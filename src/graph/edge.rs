//! Edge handle.

use std::collections::HashMap;
use std::fmt;

use crate::kv::KvStore;

use super::node::Node;
use super::store::{GraphResult, GraphStore};
use super::types::{EdgeId, EntityKind};

/// A handle onto one directed edge of a graph.
///
/// The parent and child references were written when the edge was created
/// and never change for the life of the edge.
pub struct Edge<'g, K: KvStore> {
    graph: &'g GraphStore<K>,
    id: EdgeId,
}

impl<'g, K: KvStore> Edge<'g, K> {
    pub(crate) fn new(graph: &'g GraphStore<K>, id: EdgeId) -> Self {
        Edge { graph, id }
    }

    pub fn id(&self) -> EdgeId {
        self.id
    }

    /// Current value of `field`.
    pub fn get(&self, field: &str) -> GraphResult<String> {
        self.graph
            .prop_get(EntityKind::Edge, self.id.as_u64(), field)
    }

    /// Set `field = value`, re-deriving the indexes.
    pub fn set(&self, field: &str, value: &str) -> GraphResult<()> {
        self.graph
            .prop_set(EntityKind::Edge, self.id.as_u64(), field, value)
    }

    /// Remove `field` and its index entries.
    pub fn remove(&self, field: &str) -> GraphResult<()> {
        self.graph
            .prop_remove(EntityKind::Edge, self.id.as_u64(), field)
    }

    /// Snapshot of all properties.
    pub fn properties(&self) -> GraphResult<HashMap<String, String>> {
        self.graph.prop_dump(EntityKind::Edge, self.id.as_u64())
    }

    /// The node this edge starts from.
    pub fn parent_node(&self) -> GraphResult<Node<'g, K>> {
        self.graph
            .edge_parent_of(self.id)
            .map(|id| Node::new(self.graph, id))
    }

    /// The node this edge points to.
    pub fn child_node(&self) -> GraphResult<Node<'g, K>> {
        self.graph
            .edge_child_of(self.id)
            .map(|id| Node::new(self.graph, id))
    }
}

impl<K: KvStore> fmt::Debug for Edge<'_, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Edge({})", self.id)
    }
}

impl<K: KvStore> PartialEq for Edge<'_, K> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<K: KvStore> Eq for Edge<'_, K> {}

impl<K: KvStore> Clone for Edge<'_, K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: KvStore> Copy for Edge<'_, K> {}
