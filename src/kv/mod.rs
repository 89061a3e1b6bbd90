//! Transactional boundary to the underlying ordered key-value store.
//!
//! The graph layer holds no state of its own; everything lives in a store
//! that understands four value shapes under string keys: scalars, sets,
//! field maps and weighted sets. [`KvTxn`] carries exactly those shapes
//! plus `commit`, and [`KvStore`] hands out transactions. Two backends are
//! provided: [`MemoryKv`] (in-memory, optimistic per-key versioning) and
//! [`RocksKv`] (RocksDB, logical keys mapped onto the ordered keyspace).

pub mod memory;
pub mod rocks;

pub use memory::MemoryKv;
pub use rocks::RocksKv;

use thiserror::Error;

/// Errors surfaced by a store backend.
#[derive(Error, Debug)]
pub enum KvError {
    /// Optimistic commit validation failed; the caller retries the
    /// transaction. Never surfaced through the graph API.
    #[error("transaction conflict")]
    Conflict,

    /// A logical key was accessed with the wrong value shape.
    #[error("wrong value shape for key {0}")]
    WrongType(String),

    /// A stored value could not be decoded.
    #[error("corrupt value under key {0}")]
    Corrupt(String),

    /// RocksDB error.
    #[error("RocksDB error: {0}")]
    Rocks(#[from] rocksdb::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type KvResult<T> = Result<T, KvError>;

/// One transaction against the store.
///
/// All reads and writes inside a transaction observe the transaction's own
/// uncommitted writes. Writes become visible to other transactions only at
/// a successful [`commit`](KvTxn::commit); dropping a transaction discards
/// them. A transaction opened through [`KvStore::begin`] tracks its reads
/// and commit fails with [`KvError::Conflict`] if any read value changed
/// underneath it.
pub trait KvTxn {
    /// Read a scalar key.
    fn get(&mut self, key: &str) -> KvResult<Option<String>>;

    /// Write a scalar key.
    fn put(&mut self, key: &str, value: &str) -> KvResult<()>;

    /// Drop a logical key of any shape, members included.
    fn delete(&mut self, key: &str) -> KvResult<()>;

    /// Add a member to a set. Adding an existing member is a no-op.
    fn set_add(&mut self, key: &str, member: &str) -> KvResult<()>;

    /// Remove a member from a set. Missing keys and members are no-ops.
    fn set_remove(&mut self, key: &str, member: &str) -> KvResult<()>;

    /// Membership test; a missing key is an empty set.
    fn set_contains(&mut self, key: &str, member: &str) -> KvResult<bool>;

    /// All members of a set, in unspecified order.
    fn set_members(&mut self, key: &str) -> KvResult<Vec<String>>;

    /// Read one field of a field map.
    fn map_get(&mut self, key: &str, field: &str) -> KvResult<Option<String>>;

    /// Write one field of a field map.
    fn map_put(&mut self, key: &str, field: &str, value: &str) -> KvResult<()>;

    /// Remove one field; returns whether the field existed.
    fn map_remove(&mut self, key: &str, field: &str) -> KvResult<bool>;

    /// All (field, value) entries of a field map.
    fn map_entries(&mut self, key: &str) -> KvResult<Vec<(String, String)>>;

    /// Adjust a member's weight by `delta`, creating the entry at `delta`
    /// when absent, and return the resulting weight. Entries are kept even
    /// at weight zero; removal is the caller's call via
    /// [`weighted_remove`](KvTxn::weighted_remove).
    fn weighted_incr(&mut self, key: &str, member: &str, delta: i64) -> KvResult<i64>;

    /// Remove a member from a weighted set.
    fn weighted_remove(&mut self, key: &str, member: &str) -> KvResult<()>;

    /// All (member, weight) entries, ordered by weight ascending, ties by
    /// lexicographic byte order of the member.
    fn weighted_entries(&mut self, key: &str) -> KvResult<Vec<(String, i64)>>;

    /// Make the transaction's writes visible atomically.
    fn commit(self) -> KvResult<()>;
}

/// A store that can open transactions.
pub trait KvStore {
    /// Transaction type tied to the store's lifetime.
    type Txn<'a>: KvTxn
    where
        Self: 'a;

    /// Open a tracked transaction for a mutation. Reads are recorded and
    /// validated at commit; conflicting commits fail with
    /// [`KvError::Conflict`] so the caller can retry.
    fn begin(&self) -> KvResult<Self::Txn<'_>>;

    /// Open a transaction for queries. It must never block concurrent
    /// writers. Backends that validate reads fail the commit with
    /// [`KvError::Conflict`] when the read set spans more than one
    /// committed state, so the caller re-runs the query instead of ever
    /// observing a torn one.
    fn begin_read(&self) -> KvResult<Self::Txn<'_>>;
}
