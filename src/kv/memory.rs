//! In-memory store backend.
//!
//! The reference implementation of the store contract: every logical key
//! holds one typed value and one version counter. Transactions buffer
//! their writes and record the version of every key they read; commit
//! validates the whole read set under the write lock and either applies
//! the buffer atomically or fails with [`KvError::Conflict`]. Read-only
//! transactions get the same validation, so a committed read set is
//! guaranteed to have come from one consistent state; readers retry
//! instead of blocking writers.

use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use super::{KvError, KvResult, KvStore, KvTxn};

/// One logical value. A key holds exactly one shape at a time.
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Scalar(String),
    Set(BTreeSet<String>),
    Map(BTreeMap<String, String>),
    Weighted(BTreeMap<String, i64>),
}

#[derive(Debug, Default)]
struct Shared {
    data: HashMap<String, Value>,
    versions: HashMap<String, u64>,
    commit_seq: u64,
}

/// Shared in-memory store. `Clone` hands out another handle onto the same
/// data, so one store can back several graphs or threads.
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    shared: Arc<RwLock<Shared>>,
}

impl MemoryKv {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKv {
    type Txn<'a>
        = MemoryTxn<'a>
    where
        Self: 'a;

    fn begin(&self) -> KvResult<Self::Txn<'_>> {
        Ok(MemoryTxn::new(self.shared.as_ref()))
    }

    fn begin_read(&self) -> KvResult<Self::Txn<'_>> {
        // Reads get the same optimistic validation as writes.
        Ok(MemoryTxn::new(self.shared.as_ref()))
    }
}

/// Optimistic transaction over [`MemoryKv`].
pub struct MemoryTxn<'a> {
    shared: &'a RwLock<Shared>,
    /// Key -> version observed at first read.
    reads: HashMap<String, u64>,
    /// Key -> buffered new value, `None` meaning deletion.
    writes: HashMap<String, Option<Value>>,
}

impl<'a> MemoryTxn<'a> {
    fn new(shared: &'a RwLock<Shared>) -> Self {
        MemoryTxn {
            shared,
            reads: HashMap::new(),
            writes: HashMap::new(),
        }
    }

    /// Current value of `key` as seen by this transaction, recording the
    /// read version for commit-time validation.
    fn load(&mut self, key: &str) -> Option<Value> {
        if let Some(buffered) = self.writes.get(key) {
            return buffered.clone();
        }
        let shared = self.shared.read();
        let version = shared.versions.get(key).copied().unwrap_or(0);
        self.reads.entry(key.to_string()).or_insert(version);
        shared.data.get(key).cloned()
    }

    fn store(&mut self, key: &str, value: Option<Value>) {
        self.writes.insert(key.to_string(), value);
    }
}

impl KvTxn for MemoryTxn<'_> {
    fn get(&mut self, key: &str) -> KvResult<Option<String>> {
        match self.load(key) {
            None => Ok(None),
            Some(Value::Scalar(s)) => Ok(Some(s)),
            Some(_) => Err(KvError::WrongType(key.to_string())),
        }
    }

    fn put(&mut self, key: &str, value: &str) -> KvResult<()> {
        match self.load(key) {
            None | Some(Value::Scalar(_)) => {
                self.store(key, Some(Value::Scalar(value.to_string())));
                Ok(())
            }
            Some(_) => Err(KvError::WrongType(key.to_string())),
        }
    }

    fn delete(&mut self, key: &str) -> KvResult<()> {
        // Record the read so a concurrent writer to this key conflicts.
        self.load(key);
        self.store(key, None);
        Ok(())
    }

    fn set_add(&mut self, key: &str, member: &str) -> KvResult<()> {
        let mut set = match self.load(key) {
            None => BTreeSet::new(),
            Some(Value::Set(s)) => s,
            Some(_) => return Err(KvError::WrongType(key.to_string())),
        };
        set.insert(member.to_string());
        self.store(key, Some(Value::Set(set)));
        Ok(())
    }

    fn set_remove(&mut self, key: &str, member: &str) -> KvResult<()> {
        let mut set = match self.load(key) {
            None => return Ok(()),
            Some(Value::Set(s)) => s,
            Some(_) => return Err(KvError::WrongType(key.to_string())),
        };
        set.remove(member);
        let next = if set.is_empty() { None } else { Some(Value::Set(set)) };
        self.store(key, next);
        Ok(())
    }

    fn set_contains(&mut self, key: &str, member: &str) -> KvResult<bool> {
        match self.load(key) {
            None => Ok(false),
            Some(Value::Set(s)) => Ok(s.contains(member)),
            Some(_) => Err(KvError::WrongType(key.to_string())),
        }
    }

    fn set_members(&mut self, key: &str) -> KvResult<Vec<String>> {
        match self.load(key) {
            None => Ok(Vec::new()),
            Some(Value::Set(s)) => Ok(s.into_iter().collect()),
            Some(_) => Err(KvError::WrongType(key.to_string())),
        }
    }

    fn map_get(&mut self, key: &str, field: &str) -> KvResult<Option<String>> {
        match self.load(key) {
            None => Ok(None),
            Some(Value::Map(m)) => Ok(m.get(field).cloned()),
            Some(_) => Err(KvError::WrongType(key.to_string())),
        }
    }

    fn map_put(&mut self, key: &str, field: &str, value: &str) -> KvResult<()> {
        let mut map = match self.load(key) {
            None => BTreeMap::new(),
            Some(Value::Map(m)) => m,
            Some(_) => return Err(KvError::WrongType(key.to_string())),
        };
        map.insert(field.to_string(), value.to_string());
        self.store(key, Some(Value::Map(map)));
        Ok(())
    }

    fn map_remove(&mut self, key: &str, field: &str) -> KvResult<bool> {
        let mut map = match self.load(key) {
            None => return Ok(false),
            Some(Value::Map(m)) => m,
            Some(_) => return Err(KvError::WrongType(key.to_string())),
        };
        let existed = map.remove(field).is_some();
        let next = if map.is_empty() { None } else { Some(Value::Map(map)) };
        self.store(key, next);
        Ok(existed)
    }

    fn map_entries(&mut self, key: &str) -> KvResult<Vec<(String, String)>> {
        match self.load(key) {
            None => Ok(Vec::new()),
            Some(Value::Map(m)) => Ok(m.into_iter().collect()),
            Some(_) => Err(KvError::WrongType(key.to_string())),
        }
    }

    fn weighted_incr(&mut self, key: &str, member: &str, delta: i64) -> KvResult<i64> {
        let mut map = match self.load(key) {
            None => BTreeMap::new(),
            Some(Value::Weighted(m)) => m,
            Some(_) => return Err(KvError::WrongType(key.to_string())),
        };
        let weight = map.get(member).copied().unwrap_or(0) + delta;
        map.insert(member.to_string(), weight);
        self.store(key, Some(Value::Weighted(map)));
        Ok(weight)
    }

    fn weighted_remove(&mut self, key: &str, member: &str) -> KvResult<()> {
        let mut map = match self.load(key) {
            None => return Ok(()),
            Some(Value::Weighted(m)) => m,
            Some(_) => return Err(KvError::WrongType(key.to_string())),
        };
        map.remove(member);
        let next = if map.is_empty() {
            None
        } else {
            Some(Value::Weighted(map))
        };
        self.store(key, next);
        Ok(())
    }

    fn weighted_entries(&mut self, key: &str) -> KvResult<Vec<(String, i64)>> {
        let map = match self.load(key) {
            None => return Ok(Vec::new()),
            Some(Value::Weighted(m)) => m,
            Some(_) => return Err(KvError::WrongType(key.to_string())),
        };
        let mut entries: Vec<(String, i64)> = map.into_iter().collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        Ok(entries)
    }

    fn commit(self) -> KvResult<()> {
        if self.reads.is_empty() && self.writes.is_empty() {
            return Ok(());
        }
        let mut shared = self.shared.write();
        for (key, seen) in &self.reads {
            let current = shared.versions.get(key).copied().unwrap_or(0);
            if current != *seen {
                return Err(KvError::Conflict);
            }
        }
        if self.writes.is_empty() {
            return Ok(());
        }
        shared.commit_seq += 1;
        let seq = shared.commit_seq;
        for (key, value) in self.writes {
            shared.versions.insert(key.clone(), seq);
            match value {
                Some(v) => {
                    shared.data.insert(key, v);
                }
                None => {
                    shared.data.remove(&key);
                }
            }
        }
        Ok(())
    }
}
