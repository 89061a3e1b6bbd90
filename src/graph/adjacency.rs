//! Adjacency sets and parallel-edge weights.
//!
//! Each node carries its incoming and outgoing edge-id sets plus two
//! weighted neighbor maps, where a neighbor's weight is the number of live
//! parallel edges to or from it. Weights and edge sets move together in
//! the caller's transaction; entries never linger at weight zero.

use crate::kv::KvTxn;

use super::keys::KeySpace;
use super::store::{parse_id, GraphResult};

/// Maintains per-node edge sets and weighted parent/child counts.
pub struct AdjacencyTracker {
    keys: KeySpace,
}

impl AdjacencyTracker {
    pub(crate) fn new(keys: KeySpace) -> Self {
        AdjacencyTracker { keys }
    }

    /// Record edge `edge` from `parent` to `child`.
    pub fn connect(
        &self,
        txn: &mut impl KvTxn,
        parent: u64,
        child: u64,
        edge: u64,
    ) -> GraphResult<()> {
        let member = edge.to_string();
        txn.set_add(&self.keys.out_edges(parent), &member)?;
        txn.set_add(&self.keys.in_edges(child), &member)?;
        txn.weighted_incr(&self.keys.children(parent), &child.to_string(), 1)?;
        txn.weighted_incr(&self.keys.parents(child), &parent.to_string(), 1)?;
        Ok(())
    }

    /// Remove edge `edge` from `parent` to `child`, dropping neighbor
    /// entries that reach weight zero.
    pub fn disconnect(
        &self,
        txn: &mut impl KvTxn,
        parent: u64,
        child: u64,
        edge: u64,
    ) -> GraphResult<()> {
        let member = edge.to_string();
        txn.set_remove(&self.keys.out_edges(parent), &member)?;
        txn.set_remove(&self.keys.in_edges(child), &member)?;

        let children_key = self.keys.children(parent);
        let child_member = child.to_string();
        if txn.weighted_incr(&children_key, &child_member, -1)? <= 0 {
            txn.weighted_remove(&children_key, &child_member)?;
        }
        let parents_key = self.keys.parents(child);
        let parent_member = parent.to_string();
        if txn.weighted_incr(&parents_key, &parent_member, -1)? <= 0 {
            txn.weighted_remove(&parents_key, &parent_member)?;
        }
        Ok(())
    }

    /// Children of `node` with their parallel-edge counts, weight
    /// ascending, ties in member order.
    pub fn children_of(&self, txn: &mut impl KvTxn, node: u64) -> GraphResult<Vec<(u64, i64)>> {
        self.neighbors(txn, self.keys.children(node))
    }

    /// Parents of `node` with their parallel-edge counts.
    pub fn parents_of(&self, txn: &mut impl KvTxn, node: u64) -> GraphResult<Vec<(u64, i64)>> {
        self.neighbors(txn, self.keys.parents(node))
    }

    /// Outgoing edge ids of `node`, unordered.
    pub fn out_edges_of(&self, txn: &mut impl KvTxn, node: u64) -> GraphResult<Vec<u64>> {
        Self::edge_set(txn, &self.keys.out_edges(node))
    }

    /// Incoming edge ids of `node`, unordered.
    pub fn in_edges_of(&self, txn: &mut impl KvTxn, node: u64) -> GraphResult<Vec<u64>> {
        Self::edge_set(txn, &self.keys.in_edges(node))
    }

    fn neighbors(&self, txn: &mut impl KvTxn, key: String) -> GraphResult<Vec<(u64, i64)>> {
        let mut out = Vec::new();
        for (member, weight) in txn.weighted_entries(&key)? {
            out.push((parse_id(&member)?, weight));
        }
        Ok(out)
    }

    fn edge_set(txn: &mut impl KvTxn, key: &str) -> GraphResult<Vec<u64>> {
        let mut out = Vec::new();
        for member in txn.set_members(key)? {
            out.push(parse_id(&member)?);
        }
        Ok(out)
    }
}
