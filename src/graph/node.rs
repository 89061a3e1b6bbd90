//! Node handle.

use std::collections::HashMap;
use std::fmt;

use crate::kv::KvStore;

use super::edge::Edge;
use super::store::{GraphResult, GraphStore};
use super::types::{EntityKind, NodeId};

/// A handle onto one node of a graph.
///
/// Handles are cheap (an id plus a borrow of the graph) and every
/// accessor reads the store, so a handle always reflects current state.
/// Mutating through a handle whose node has been deleted fails with
/// `NodeNotFound` rather than resurrecting index entries.
pub struct Node<'g, K: KvStore> {
    graph: &'g GraphStore<K>,
    id: NodeId,
}

impl<'g, K: KvStore> Node<'g, K> {
    pub(crate) fn new(graph: &'g GraphStore<K>, id: NodeId) -> Self {
        Node { graph, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Current value of `field`.
    pub fn get(&self, field: &str) -> GraphResult<String> {
        self.graph
            .prop_get(EntityKind::Node, self.id.as_u64(), field)
    }

    /// Set `field = value`, re-deriving the indexes.
    pub fn set(&self, field: &str, value: &str) -> GraphResult<()> {
        self.graph
            .prop_set(EntityKind::Node, self.id.as_u64(), field, value)
    }

    /// Remove `field` and its index entries.
    pub fn remove(&self, field: &str) -> GraphResult<()> {
        self.graph
            .prop_remove(EntityKind::Node, self.id.as_u64(), field)
    }

    /// Snapshot of all properties.
    pub fn properties(&self) -> GraphResult<HashMap<String, String>> {
        self.graph.prop_dump(EntityKind::Node, self.id.as_u64())
    }

    /// Parent nodes with parallel-edge counts, weight ascending.
    pub fn parents(&self) -> GraphResult<Vec<(Node<'g, K>, i64)>> {
        Ok(self
            .graph
            .parents_of(self.id)?
            .into_iter()
            .map(|(id, weight)| (Node::new(self.graph, id), weight))
            .collect())
    }

    /// Child nodes with parallel-edge counts, weight ascending.
    pub fn children(&self) -> GraphResult<Vec<(Node<'g, K>, i64)>> {
        Ok(self
            .graph
            .children_of(self.id)?
            .into_iter()
            .map(|(id, weight)| (Node::new(self.graph, id), weight))
            .collect())
    }

    /// Incoming edges, unordered.
    pub fn in_edges(&self) -> GraphResult<Vec<Edge<'g, K>>> {
        Ok(self
            .graph
            .in_edges_of(self.id)?
            .into_iter()
            .map(|id| Edge::new(self.graph, id))
            .collect())
    }

    /// Outgoing edges, unordered.
    pub fn out_edges(&self) -> GraphResult<Vec<Edge<'g, K>>> {
        Ok(self
            .graph
            .out_edges_of(self.id)?
            .into_iter()
            .map(|id| Edge::new(self.graph, id))
            .collect())
    }
}

impl<K: KvStore> fmt::Debug for Node<'_, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.id)
    }
}

impl<K: KvStore> PartialEq for Node<'_, K> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<K: KvStore> Eq for Node<'_, K> {}

impl<K: KvStore> Clone for Node<'_, K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: KvStore> Copy for Node<'_, K> {}
