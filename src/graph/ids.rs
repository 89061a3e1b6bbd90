//! Monotonic id allocation.

use crate::kv::KvTxn;

use super::keys::KeySpace;
use super::store::{GraphError, GraphResult};
use super::types::EntityKind;

/// Issues monotonically increasing ids per entity kind.
///
/// The counter is the single source of new identifiers; membership-set
/// sizes are never consulted. Allocation runs inside the caller's
/// transaction, so two allocations racing on one counter conflict at
/// commit and one of them retries with a fresh value. Ids are unique
/// forever and never returned to circulation by deletion.
pub struct IdAllocator {
    keys: KeySpace,
}

impl IdAllocator {
    pub(crate) fn new(keys: KeySpace) -> Self {
        IdAllocator { keys }
    }

    /// Return the current counter value for `kind` and advance it. An
    /// absent counter reads as 0.
    pub fn allocate(&self, txn: &mut impl KvTxn, kind: EntityKind) -> GraphResult<u64> {
        let key = self.keys.counter(kind);
        let current = match txn.get(&key)? {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| GraphError::Corruption(format!("counter {key} holds `{raw}`")))?,
            None => 0,
        };
        txn.put(&key, &(current + 1).to_string())?;
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{KvStore, MemoryKv};

    #[test]
    fn test_allocation_is_monotonic_per_kind() {
        let kv = MemoryKv::new();
        let alloc = IdAllocator::new(KeySpace::new("t"));

        let mut txn = kv.begin().unwrap();
        assert_eq!(alloc.allocate(&mut txn, EntityKind::Node).unwrap(), 0);
        assert_eq!(alloc.allocate(&mut txn, EntityKind::Node).unwrap(), 1);
        assert_eq!(alloc.allocate(&mut txn, EntityKind::Edge).unwrap(), 0);
        assert_eq!(alloc.allocate(&mut txn, EntityKind::Node).unwrap(), 2);
        txn.commit().unwrap();

        let mut txn = kv.begin().unwrap();
        assert_eq!(alloc.allocate(&mut txn, EntityKind::Node).unwrap(), 3);
        assert_eq!(alloc.allocate(&mut txn, EntityKind::Edge).unwrap(), 1);
    }

    #[test]
    fn test_namespaces_have_independent_counters() {
        let kv = MemoryKv::new();
        let a = IdAllocator::new(KeySpace::new("a"));
        let b = IdAllocator::new(KeySpace::new("b"));

        let mut txn = kv.begin().unwrap();
        assert_eq!(a.allocate(&mut txn, EntityKind::Node).unwrap(), 0);
        assert_eq!(a.allocate(&mut txn, EntityKind::Node).unwrap(), 1);
        assert_eq!(b.allocate(&mut txn, EntityKind::Node).unwrap(), 0);
    }
}
