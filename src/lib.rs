//! # lodestone
//!
//! A directed property graph overlaid on an ordered key-value store.
//!
//! Nodes and edges carry arbitrary string properties. The crate's core is
//! the mapping layer that keeps the derived structures (membership sets,
//! adjacency sets, parallel-edge weights, forward and composite property
//! indexes) consistent as the graph mutates: every composite mutation
//! runs inside one store transaction and retries on conflict, so readers
//! and concurrent writers never observe a half-applied change.
//!
//! # Architecture
//!
//! - [`graph`]: the graph layer. Id allocation, property indexing,
//!   adjacency tracking and the orchestrating [`GraphStore`].
//! - [`kv`]: the store boundary. The [`KvStore`]/[`KvTxn`] traits plus
//!   the [`MemoryKv`] and [`RocksKv`] backends.
//!
//! Property values are opaque strings by design; typed comparison and
//! parsing are the caller's concern.
//!
//! # Example
//!
//! ```rust
//! use lodestone::{GraphStore, MemoryKv};
//!
//! let graph = GraphStore::new(MemoryKv::new(), "social");
//!
//! let alice = graph.add_node(&[("name", "alice")]).unwrap();
//! let bob = graph.add_node(&[("name", "bob")]).unwrap();
//! let edge = graph.add_edge(alice.id(), bob.id(), &[("rel", "friends")]).unwrap();
//!
//! assert_eq!(edge.get("rel").unwrap(), "friends");
//!
//! // Exact match uses the composite index; regex search scans.
//! assert_eq!(graph.get_nodes(&[("name", "bob")]).unwrap().len(), 1);
//! let found = graph.find_nodes(&[("name", "^a")]).unwrap();
//! assert_eq!(found.len(), 1);
//! assert_eq!(found[0].id(), alice.id());
//!
//! // Deleting a node cascades over its incident edges.
//! graph.del_node(alice.id()).unwrap();
//! assert!(graph.edges().unwrap().is_empty());
//! ```

#![warn(clippy::all)]

pub mod graph;
pub mod kv;

// Re-export main types for convenience
pub use graph::{Edge, EdgeId, EntityKind, GraphError, GraphResult, GraphStore, Node, NodeId};
pub use kv::{KvError, KvResult, KvStore, KvTxn, MemoryKv, RocksKv};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
        assert_eq!(ver, "0.1.0");
    }
}
