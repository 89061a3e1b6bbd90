//! Graph orchestration over the transactional store boundary.
//!
//! `GraphStore` owns the store handle and the three derived-state
//! components, and runs every composite mutation (node/edge create and
//! delete, property writes) inside one store transaction. Commit
//! conflicts are retried with a fresh transaction, so concurrent writers
//! see either the full pre-mutation or the full post-mutation state,
//! never an interleaving. Queries run in read transactions that never
//! block writers; where the backend validates reads, a query that raced a
//! commit re-runs instead of returning a torn result.

use std::collections::HashMap;
use std::fmt;

use rustc_hash::FxHashSet;
use thiserror::Error;
use tracing::debug;

use crate::kv::{KvError, KvStore, KvTxn};

use super::adjacency::AdjacencyTracker;
use super::edge::Edge;
use super::ids::IdAllocator;
use super::keys::KeySpace;
use super::node::Node;
use super::props::PropertyIndexer;
use super::types::{EdgeId, EntityKind, NodeId};

/// Errors that can occur during graph operations.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    #[error("edge {0} not found")]
    EdgeNotFound(EdgeId),

    #[error("property {0} not found")]
    PropertyNotFound(String),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("corrupt graph state: {0}")]
    Corruption(String),

    #[error(transparent)]
    Kv(#[from] KvError),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Parse a string-encoded id read back from the store.
pub(crate) fn parse_id(raw: &str) -> GraphResult<u64> {
    raw.parse()
        .map_err(|_| GraphError::Corruption(format!("id entry `{raw}`")))
}

/// A directed property graph in one namespace of a store.
pub struct GraphStore<K: KvStore> {
    kv: K,
    keys: KeySpace,
    ids: IdAllocator,
    props: PropertyIndexer,
    adjacency: AdjacencyTracker,
}

impl<K: KvStore> GraphStore<K> {
    /// Open the graph stored under `namespace`. The namespace is created
    /// implicitly on first mutation and never destroyed by this layer.
    pub fn new(kv: K, namespace: impl Into<String>) -> Self {
        let keys = KeySpace::new(namespace);
        GraphStore {
            ids: IdAllocator::new(keys.clone()),
            props: PropertyIndexer::new(keys.clone()),
            adjacency: AdjacencyTracker::new(keys.clone()),
            keys,
            kv,
        }
    }

    pub fn namespace(&self) -> &str {
        self.keys.namespace()
    }

    /// Run `body` in a tracked transaction, retrying on commit conflicts
    /// until it lands. Errors from `body` abort without committing, so a
    /// failed mutation leaves no trace.
    fn with_txn<'s, T, F>(&'s self, mut body: F) -> GraphResult<T>
    where
        F: FnMut(&mut K::Txn<'s>) -> GraphResult<T>,
    {
        loop {
            let mut txn = self.kv.begin()?;
            let out = body(&mut txn)?;
            match txn.commit() {
                Ok(()) => return Ok(out),
                Err(KvError::Conflict) => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Run `body` in a read transaction. Commit only validates: backends
    /// that track reads refuse a read set spanning two states, in which
    /// case the query re-runs against the newer one.
    fn with_read<'s, T, F>(&'s self, mut body: F) -> GraphResult<T>
    where
        F: FnMut(&mut K::Txn<'s>) -> GraphResult<T>,
    {
        loop {
            let mut txn = self.kv.begin_read()?;
            let out = body(&mut txn)?;
            match txn.commit() {
                Ok(()) => return Ok(out),
                Err(KvError::Conflict) => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn ensure_member<'a>(
        &self,
        txn: &mut K::Txn<'a>,
        kind: EntityKind,
        id: u64,
    ) -> GraphResult<()> {
        if txn.set_contains(&self.keys.members(kind), &id.to_string())? {
            Ok(())
        } else {
            Err(match kind {
                EntityKind::Node => GraphError::NodeNotFound(NodeId::new(id)),
                EntityKind::Edge => GraphError::EdgeNotFound(EdgeId::new(id)),
            })
        }
    }

    /// Add a node with the given initial properties.
    pub fn add_node(&self, props: &[(&str, &str)]) -> GraphResult<Node<'_, K>> {
        let id = self.with_txn(|txn| {
            let id = self.ids.allocate(txn, EntityKind::Node)?;
            txn.set_add(&self.keys.members(EntityKind::Node), &id.to_string())?;
            for &(field, value) in props {
                self.props.set(txn, EntityKind::Node, id, field, value)?;
            }
            Ok(id)
        })?;
        debug!(namespace = self.namespace(), id, "added node");
        Ok(Node::new(self, NodeId::new(id)))
    }

    /// Add a directed edge from `parent` to `child`. Both endpoints must
    /// be live nodes. Parallel edges between the same pair are allowed and
    /// accumulate neighbor weight.
    pub fn add_edge(
        &self,
        parent: NodeId,
        child: NodeId,
        props: &[(&str, &str)],
    ) -> GraphResult<Edge<'_, K>> {
        let id = self.with_txn(|txn| {
            self.ensure_member(txn, EntityKind::Node, parent.as_u64())?;
            self.ensure_member(txn, EntityKind::Node, child.as_u64())?;

            let id = self.ids.allocate(txn, EntityKind::Edge)?;
            txn.put(&self.keys.edge_parent(id), &parent.to_string())?;
            txn.put(&self.keys.edge_child(id), &child.to_string())?;
            self.adjacency
                .connect(txn, parent.as_u64(), child.as_u64(), id)?;
            for &(field, value) in props {
                self.props.set(txn, EntityKind::Edge, id, field, value)?;
            }
            txn.set_add(&self.keys.members(EntityKind::Edge), &id.to_string())?;
            Ok(id)
        })?;
        debug!(
            namespace = self.namespace(),
            id,
            parent = parent.as_u64(),
            child = child.as_u64(),
            "added edge"
        );
        Ok(Edge::new(self, EdgeId::new(id)))
    }

    /// Delete a node, cascading over its incident edges first. Once this
    /// returns, the id appears in no membership, index or relationship
    /// set.
    pub fn del_node(&self, id: NodeId) -> GraphResult<()> {
        self.with_txn(|txn| {
            self.ensure_member(txn, EntityKind::Node, id.as_u64())?;

            let mut incident = FxHashSet::default();
            for eid in self.adjacency.in_edges_of(txn, id.as_u64())? {
                incident.insert(eid);
            }
            for eid in self.adjacency.out_edges_of(txn, id.as_u64())? {
                incident.insert(eid);
            }
            for eid in incident {
                self.del_edge_in(txn, EdgeId::new(eid))?;
            }

            self.props.deindex_all(txn, EntityKind::Node, id.as_u64())?;
            txn.delete(&self.keys.out_edges(id.as_u64()))?;
            txn.delete(&self.keys.in_edges(id.as_u64()))?;
            txn.delete(&self.keys.children(id.as_u64()))?;
            txn.delete(&self.keys.parents(id.as_u64()))?;
            txn.set_remove(&self.keys.members(EntityKind::Node), &id.to_string())?;
            Ok(())
        })?;
        debug!(namespace = self.namespace(), id = id.as_u64(), "deleted node");
        Ok(())
    }

    /// Delete an edge, unwinding adjacency and index state.
    pub fn del_edge(&self, id: EdgeId) -> GraphResult<()> {
        self.with_txn(|txn| self.del_edge_in(txn, id))?;
        debug!(namespace = self.namespace(), id = id.as_u64(), "deleted edge");
        Ok(())
    }

    fn del_edge_in<'a>(&self, txn: &mut K::Txn<'a>, id: EdgeId) -> GraphResult<()> {
        self.ensure_member(txn, EntityKind::Edge, id.as_u64())?;

        let parent = self.endpoint(txn, &self.keys.edge_parent(id.as_u64()), id)?;
        let child = self.endpoint(txn, &self.keys.edge_child(id.as_u64()), id)?;

        self.adjacency.disconnect(txn, parent, child, id.as_u64())?;
        self.props.deindex_all(txn, EntityKind::Edge, id.as_u64())?;
        txn.delete(&self.keys.edge_parent(id.as_u64()))?;
        txn.delete(&self.keys.edge_child(id.as_u64()))?;
        txn.set_remove(&self.keys.members(EntityKind::Edge), &id.to_string())?;
        Ok(())
    }

    fn endpoint<'a>(&self, txn: &mut K::Txn<'a>, key: &str, id: EdgeId) -> GraphResult<u64> {
        let raw = txn
            .get(key)?
            .ok_or_else(|| GraphError::Corruption(format!("edge {id} missing endpoint")))?;
        parse_id(&raw)
    }

    /// Membership-checked node lookup.
    pub fn node(&self, id: NodeId) -> GraphResult<Node<'_, K>> {
        self.with_read(|txn| self.ensure_member(txn, EntityKind::Node, id.as_u64()))?;
        Ok(Node::new(self, id))
    }

    /// Membership-checked edge lookup.
    pub fn edge(&self, id: EdgeId) -> GraphResult<Edge<'_, K>> {
        self.with_read(|txn| self.ensure_member(txn, EntityKind::Edge, id.as_u64()))?;
        Ok(Edge::new(self, id))
    }

    /// All live nodes, ordered by id.
    pub fn nodes(&self) -> GraphResult<Vec<Node<'_, K>>> {
        let ids = self.with_read(|txn| {
            let mut ids = FxHashSet::default();
            for raw in txn.set_members(&self.keys.members(EntityKind::Node))? {
                ids.insert(parse_id(&raw)?);
            }
            Ok(ids)
        })?;
        Ok(self.node_handles(ids))
    }

    /// All live edges, ordered by id.
    pub fn edges(&self) -> GraphResult<Vec<Edge<'_, K>>> {
        let ids = self.with_read(|txn| {
            let mut ids = FxHashSet::default();
            for raw in txn.set_members(&self.keys.members(EntityKind::Edge))? {
                ids.insert(parse_id(&raw)?);
            }
            Ok(ids)
        })?;
        Ok(self.edge_handles(ids))
    }

    /// Nodes whose properties equal every criteria pair exactly. Empty
    /// criteria match nothing; use [`nodes`](GraphStore::nodes) to list
    /// everything.
    pub fn get_nodes(&self, criteria: &[(&str, &str)]) -> GraphResult<Vec<Node<'_, K>>> {
        let ids = self.with_read(|txn| self.props.exact_match(txn, EntityKind::Node, criteria))?;
        Ok(self.node_handles(ids))
    }

    /// Edges whose properties equal every criteria pair exactly.
    pub fn get_edges(&self, criteria: &[(&str, &str)]) -> GraphResult<Vec<Edge<'_, K>>> {
        let ids = self.with_read(|txn| self.props.exact_match(txn, EntityKind::Edge, criteria))?;
        Ok(self.edge_handles(ids))
    }

    /// Nodes whose properties match every criteria pattern (unanchored
    /// regex search). Unindexed; cost grows with the forward sets.
    pub fn find_nodes(&self, criteria: &[(&str, &str)]) -> GraphResult<Vec<Node<'_, K>>> {
        let ids = self.with_read(|txn| self.props.regex_match(txn, EntityKind::Node, criteria))?;
        Ok(self.node_handles(ids))
    }

    /// Edges whose properties match every criteria pattern.
    pub fn find_edges(&self, criteria: &[(&str, &str)]) -> GraphResult<Vec<Edge<'_, K>>> {
        let ids = self.with_read(|txn| self.props.regex_match(txn, EntityKind::Edge, criteria))?;
        Ok(self.edge_handles(ids))
    }

    fn node_handles(&self, ids: FxHashSet<u64>) -> Vec<Node<'_, K>> {
        let mut sorted: Vec<u64> = ids.into_iter().collect();
        sorted.sort_unstable();
        sorted
            .into_iter()
            .map(|id| Node::new(self, NodeId::new(id)))
            .collect()
    }

    fn edge_handles(&self, ids: FxHashSet<u64>) -> Vec<Edge<'_, K>> {
        let mut sorted: Vec<u64> = ids.into_iter().collect();
        sorted.sort_unstable();
        sorted
            .into_iter()
            .map(|id| Edge::new(self, EdgeId::new(id)))
            .collect()
    }

    // Handle plumbing. Property mutations verify membership inside their
    // transaction so a stale handle cannot re-create index entries for a
    // deleted entity.

    pub(crate) fn prop_set(
        &self,
        kind: EntityKind,
        id: u64,
        field: &str,
        value: &str,
    ) -> GraphResult<()> {
        self.with_txn(|txn| {
            self.ensure_member(txn, kind, id)?;
            self.props.set(txn, kind, id, field, value)
        })
    }

    pub(crate) fn prop_remove(&self, kind: EntityKind, id: u64, field: &str) -> GraphResult<()> {
        self.with_txn(|txn| {
            self.ensure_member(txn, kind, id)?;
            self.props.remove(txn, kind, id, field)
        })
    }

    pub(crate) fn prop_get(&self, kind: EntityKind, id: u64, field: &str) -> GraphResult<String> {
        self.with_read(|txn| self.props.get(txn, kind, id, field))
    }

    pub(crate) fn prop_dump(
        &self,
        kind: EntityKind,
        id: u64,
    ) -> GraphResult<HashMap<String, String>> {
        self.with_read(|txn| self.props.dump(txn, kind, id))
    }

    pub(crate) fn children_of(&self, id: NodeId) -> GraphResult<Vec<(NodeId, i64)>> {
        let pairs = self.with_read(|txn| self.adjacency.children_of(txn, id.as_u64()))?;
        Ok(pairs
            .into_iter()
            .map(|(n, w)| (NodeId::new(n), w))
            .collect())
    }

    pub(crate) fn parents_of(&self, id: NodeId) -> GraphResult<Vec<(NodeId, i64)>> {
        let pairs = self.with_read(|txn| self.adjacency.parents_of(txn, id.as_u64()))?;
        Ok(pairs
            .into_iter()
            .map(|(n, w)| (NodeId::new(n), w))
            .collect())
    }

    pub(crate) fn in_edges_of(&self, id: NodeId) -> GraphResult<Vec<EdgeId>> {
        let ids = self.with_read(|txn| self.adjacency.in_edges_of(txn, id.as_u64()))?;
        Ok(ids.into_iter().map(EdgeId::new).collect())
    }

    pub(crate) fn out_edges_of(&self, id: NodeId) -> GraphResult<Vec<EdgeId>> {
        let ids = self.with_read(|txn| self.adjacency.out_edges_of(txn, id.as_u64()))?;
        Ok(ids.into_iter().map(EdgeId::new).collect())
    }

    pub(crate) fn edge_parent_of(&self, id: EdgeId) -> GraphResult<NodeId> {
        self.with_read(|txn| {
            let raw = txn
                .get(&self.keys.edge_parent(id.as_u64()))?
                .ok_or(GraphError::EdgeNotFound(id))?;
            Ok(NodeId::new(parse_id(&raw)?))
        })
    }

    pub(crate) fn edge_child_of(&self, id: EdgeId) -> GraphResult<NodeId> {
        self.with_read(|txn| {
            let raw = txn
                .get(&self.keys.edge_child(id.as_u64()))?
                .ok_or(GraphError::EdgeNotFound(id))?;
            Ok(NodeId::new(parse_id(&raw)?))
        })
    }
}

impl<K: KvStore> fmt::Debug for GraphStore<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphStore")
            .field("namespace", &self.namespace())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;

    #[test]
    fn test_add_node_registers_everything() {
        let graph = GraphStore::new(MemoryKv::new(), "t");
        let node = graph.add_node(&[("name", "alice"), ("age", "30")]).unwrap();

        assert_eq!(node.id(), NodeId::new(0));
        assert_eq!(node.get("name").unwrap(), "alice");
        assert_eq!(graph.nodes().unwrap().len(), 1);
        assert_eq!(graph.get_nodes(&[("name", "alice")]).unwrap().len(), 1);
        assert_eq!(
            graph
                .get_nodes(&[("name", "alice"), ("age", "30")])
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_add_edge_requires_live_endpoints() {
        let graph = GraphStore::new(MemoryKv::new(), "t");
        let a = graph.add_node(&[]).unwrap();

        let err = graph
            .add_edge(a.id(), NodeId::new(99), &[])
            .unwrap_err();
        assert!(matches!(err, GraphError::NodeNotFound(id) if id == NodeId::new(99)));

        let err = graph
            .add_edge(NodeId::new(98), a.id(), &[])
            .unwrap_err();
        assert!(matches!(err, GraphError::NodeNotFound(id) if id == NodeId::new(98)));

        // The failed attempts must not have leaked edge state.
        assert!(graph.edges().unwrap().is_empty());
        assert!(a.out_edges().unwrap().is_empty());
    }

    #[test]
    fn test_del_missing_fails() {
        let graph = GraphStore::new(MemoryKv::new(), "t");
        assert!(matches!(
            graph.del_node(NodeId::new(5)),
            Err(GraphError::NodeNotFound(_))
        ));
        assert!(matches!(
            graph.del_edge(EdgeId::new(5)),
            Err(GraphError::EdgeNotFound(_))
        ));
    }

    #[test]
    fn test_stale_handle_cannot_mutate() {
        let graph = GraphStore::new(MemoryKv::new(), "t");
        let node = graph.add_node(&[("name", "alice")]).unwrap();
        graph.del_node(node.id()).unwrap();

        assert!(matches!(
            node.set("name", "ghost"),
            Err(GraphError::NodeNotFound(_))
        ));
        assert!(graph.get_nodes(&[("name", "ghost")]).unwrap().is_empty());
    }

    #[test]
    fn test_namespace_isolation() {
        let kv = MemoryKv::new();
        let a = GraphStore::new(kv.clone(), "a");
        let b = GraphStore::new(kv, "b");

        let node = a.add_node(&[("name", "alice")]).unwrap();
        assert_eq!(node.id(), NodeId::new(0));

        // Same backing store, disjoint graphs and counters.
        assert!(b.nodes().unwrap().is_empty());
        assert!(b.get_nodes(&[("name", "alice")]).unwrap().is_empty());
        let other = b.add_node(&[]).unwrap();
        assert_eq!(other.id(), NodeId::new(0));
    }

    #[test]
    fn test_lookup_by_id() {
        let graph = GraphStore::new(MemoryKv::new(), "t");
        let a = graph.add_node(&[]).unwrap();
        let b = graph.add_node(&[]).unwrap();
        let e = graph.add_edge(a.id(), b.id(), &[]).unwrap();

        assert_eq!(graph.node(a.id()).unwrap().id(), a.id());
        assert_eq!(graph.edge(e.id()).unwrap().id(), e.id());
        assert!(matches!(
            graph.node(NodeId::new(42)),
            Err(GraphError::NodeNotFound(_))
        ));
        assert!(matches!(
            graph.edge(EdgeId::new(42)),
            Err(GraphError::EdgeNotFound(_))
        ));
    }

    #[test]
    fn test_edge_endpoints_are_stored() {
        let graph = GraphStore::new(MemoryKv::new(), "t");
        let a = graph.add_node(&[]).unwrap();
        let b = graph.add_node(&[]).unwrap();
        let e = graph.add_edge(a.id(), b.id(), &[("rel", "knows")]).unwrap();

        assert_eq!(e.parent_node().unwrap().id(), a.id());
        assert_eq!(e.child_node().unwrap().id(), b.id());
    }
}
