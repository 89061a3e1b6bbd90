//! RocksDB store backend.
//!
//! Logical typed keys are mapped onto RocksDB's ordered keyspace: each
//! logical key is escaped (`0x00` becomes `0x00 0x01`), terminated with
//! `0x00 0x00` and followed by a one-byte shape tag. Set members, map
//! fields and weighted members append their name after the tag, so every
//! collection occupies one contiguous key range and enumeration is a
//! bounded prefix scan.
//!
//! Transactions come from an `OptimisticTransactionDB`. Tracked
//! transactions read through `get_for_update`, so every point read is
//! validated at commit and conflicting writers fail with
//! [`KvError::Conflict`] and retry. Range scans read the committed state
//! plus the transaction's own writes; conflict detection is
//! member-granular, not range-granular.

use rocksdb::{
    Direction, ErrorKind, IteratorMode, OptimisticTransactionDB, OptimisticTransactionOptions,
    Options, Transaction, WriteOptions,
};
use std::path::Path;
use tracing::info;

use super::{KvError, KvResult, KvStore, KvTxn};

const TAG_SCALAR: u8 = b'v';
const TAG_SET: u8 = b's';
const TAG_MAP: u8 = b'h';
const TAG_WEIGHTED: u8 = b'z';

/// RocksDB-backed store.
pub struct RocksKv {
    db: OptimisticTransactionDB,
}

impl RocksKv {
    /// Open or create a keyspace at `path`.
    pub fn open(path: impl AsRef<Path>) -> KvResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = OptimisticTransactionDB::open(&opts, path.as_ref())?;
        info!(path = %path.as_ref().display(), "opened RocksDB keyspace");
        Ok(RocksKv { db })
    }

    fn txn(&self, tracked: bool) -> RocksTxn<'_> {
        let mut txn_opts = OptimisticTransactionOptions::new();
        txn_opts.set_snapshot(true);
        RocksTxn {
            txn: self.db.transaction_opt(&WriteOptions::default(), &txn_opts),
            tracked,
        }
    }
}

impl KvStore for RocksKv {
    type Txn<'a>
        = RocksTxn<'a>
    where
        Self: 'a;

    fn begin(&self) -> KvResult<Self::Txn<'_>> {
        Ok(self.txn(true))
    }

    fn begin_read(&self) -> KvResult<Self::Txn<'_>> {
        Ok(self.txn(false))
    }
}

/// Escaped logical key, terminator and shape tag.
fn prefix(key: &str, tag: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(key.len() + 3);
    for &b in key.as_bytes() {
        if b == 0 {
            out.push(0);
            out.push(1);
        } else {
            out.push(b);
        }
    }
    out.push(0);
    out.push(0);
    out.push(tag);
    out
}

fn member_key(key: &str, tag: u8, member: &str) -> Vec<u8> {
    let mut out = prefix(key, tag);
    out.extend_from_slice(member.as_bytes());
    out
}

fn decode_utf8(key: &str, bytes: Vec<u8>) -> KvResult<String> {
    String::from_utf8(bytes).map_err(|_| KvError::Corrupt(key.to_string()))
}

fn parse_weight(key: &str, raw: &str) -> KvResult<i64> {
    raw.parse().map_err(|_| KvError::Corrupt(key.to_string()))
}

/// Transaction over [`RocksKv`].
pub struct RocksTxn<'a> {
    txn: Transaction<'a, OptimisticTransactionDB>,
    tracked: bool,
}

impl RocksTxn<'_> {
    fn read(&self, key: &[u8]) -> KvResult<Option<Vec<u8>>> {
        let value = if self.tracked {
            self.txn.get_for_update(key, true)?
        } else {
            self.txn.get(key)?
        };
        Ok(value)
    }

    /// All (full key, value) pairs under `prefix`.
    fn scan(&self, prefix: &[u8]) -> KvResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut out = Vec::new();
        for item in self
            .txn
            .iterator(IteratorMode::From(prefix, Direction::Forward))
        {
            let (k, v) = item?;
            if !k.starts_with(prefix) {
                break;
            }
            out.push((k.into_vec(), v.into_vec()));
        }
        Ok(out)
    }

    /// Suffix of `full` after `prefix`, decoded as UTF-8.
    fn member_of(key: &str, prefix_len: usize, full: &[u8]) -> KvResult<String> {
        decode_utf8(key, full[prefix_len..].to_vec())
    }
}

impl KvTxn for RocksTxn<'_> {
    fn get(&mut self, key: &str) -> KvResult<Option<String>> {
        match self.read(&prefix(key, TAG_SCALAR))? {
            Some(bytes) => Ok(Some(decode_utf8(key, bytes)?)),
            None => Ok(None),
        }
    }

    fn put(&mut self, key: &str, value: &str) -> KvResult<()> {
        self.txn.put(prefix(key, TAG_SCALAR), value.as_bytes())?;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> KvResult<()> {
        self.txn.delete(prefix(key, TAG_SCALAR))?;
        for tag in [TAG_SET, TAG_MAP, TAG_WEIGHTED] {
            let p = prefix(key, tag);
            for (full, _) in self.scan(&p)? {
                self.txn.delete(full)?;
            }
        }
        Ok(())
    }

    fn set_add(&mut self, key: &str, member: &str) -> KvResult<()> {
        self.txn.put(member_key(key, TAG_SET, member), b"")?;
        Ok(())
    }

    fn set_remove(&mut self, key: &str, member: &str) -> KvResult<()> {
        self.txn.delete(member_key(key, TAG_SET, member))?;
        Ok(())
    }

    fn set_contains(&mut self, key: &str, member: &str) -> KvResult<bool> {
        Ok(self.read(&member_key(key, TAG_SET, member))?.is_some())
    }

    fn set_members(&mut self, key: &str) -> KvResult<Vec<String>> {
        let p = prefix(key, TAG_SET);
        let mut out = Vec::new();
        for (full, _) in self.scan(&p)? {
            out.push(Self::member_of(key, p.len(), &full)?);
        }
        Ok(out)
    }

    fn map_get(&mut self, key: &str, field: &str) -> KvResult<Option<String>> {
        match self.read(&member_key(key, TAG_MAP, field))? {
            Some(bytes) => Ok(Some(decode_utf8(key, bytes)?)),
            None => Ok(None),
        }
    }

    fn map_put(&mut self, key: &str, field: &str, value: &str) -> KvResult<()> {
        self.txn
            .put(member_key(key, TAG_MAP, field), value.as_bytes())?;
        Ok(())
    }

    fn map_remove(&mut self, key: &str, field: &str) -> KvResult<bool> {
        let k = member_key(key, TAG_MAP, field);
        let existed = self.read(&k)?.is_some();
        if existed {
            self.txn.delete(k)?;
        }
        Ok(existed)
    }

    fn map_entries(&mut self, key: &str) -> KvResult<Vec<(String, String)>> {
        let p = prefix(key, TAG_MAP);
        let mut out = Vec::new();
        for (full, value) in self.scan(&p)? {
            out.push((
                Self::member_of(key, p.len(), &full)?,
                decode_utf8(key, value)?,
            ));
        }
        Ok(out)
    }

    fn weighted_incr(&mut self, key: &str, member: &str, delta: i64) -> KvResult<i64> {
        let k = member_key(key, TAG_WEIGHTED, member);
        let current = match self.read(&k)? {
            Some(bytes) => parse_weight(key, &decode_utf8(key, bytes)?)?,
            None => 0,
        };
        let weight = current + delta;
        self.txn.put(k, weight.to_string().as_bytes())?;
        Ok(weight)
    }

    fn weighted_remove(&mut self, key: &str, member: &str) -> KvResult<()> {
        self.txn.delete(member_key(key, TAG_WEIGHTED, member))?;
        Ok(())
    }

    fn weighted_entries(&mut self, key: &str) -> KvResult<Vec<(String, i64)>> {
        let p = prefix(key, TAG_WEIGHTED);
        let mut entries = Vec::new();
        for (full, value) in self.scan(&p)? {
            let member = Self::member_of(key, p.len(), &full)?;
            let weight = parse_weight(key, &decode_utf8(key, value)?)?;
            entries.push((member, weight));
        }
        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        Ok(entries)
    }

    fn commit(self) -> KvResult<()> {
        self.txn.commit().map_err(|e| match e.kind() {
            ErrorKind::Busy | ErrorKind::TryAgain => KvError::Conflict,
            _ => KvError::Rocks(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open() -> (TempDir, RocksKv) {
        let dir = TempDir::new().unwrap();
        let kv = RocksKv::open(dir.path()).unwrap();
        (dir, kv)
    }

    #[test]
    fn test_key_encoding_is_prefix_free() {
        // A logical key containing the terminator byte cannot collide with
        // a sibling key's encoded form.
        let plain = prefix("a", TAG_SCALAR);
        let tricky = prefix("a\0x", TAG_SCALAR);
        assert!(!tricky.starts_with(&plain));
        assert_eq!(&plain[plain.len() - 3..], &[0, 0, TAG_SCALAR]);
    }

    #[test]
    fn test_scalar_and_set_round_trip() {
        let (_dir, kv) = open();
        let mut txn = kv.begin().unwrap();
        txn.put("k", "v").unwrap();
        txn.set_add("s", "a").unwrap();
        txn.set_add("s", "b").unwrap();
        txn.commit().unwrap();

        let mut reader = kv.begin_read().unwrap();
        assert_eq!(reader.get("k").unwrap(), Some("v".to_string()));
        assert!(reader.set_contains("s", "a").unwrap());
        let mut members = reader.set_members("s").unwrap();
        members.sort();
        assert_eq!(members, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_collections_do_not_bleed_across_keys() {
        let (_dir, kv) = open();
        let mut txn = kv.begin().unwrap();
        txn.set_add("s", "a").unwrap();
        txn.set_add("s2", "b").unwrap();
        txn.map_put("s", "f", "v").unwrap();
        txn.commit().unwrap();

        let mut reader = kv.begin_read().unwrap();
        assert_eq!(reader.set_members("s").unwrap(), vec!["a".to_string()]);
        assert_eq!(reader.set_members("s2").unwrap(), vec!["b".to_string()]);
        assert_eq!(reader.map_entries("s").unwrap().len(), 1);
    }

    #[test]
    fn test_map_and_weighted_ops() {
        let (_dir, kv) = open();
        let mut txn = kv.begin().unwrap();
        txn.map_put("m", "f1", "v1").unwrap();
        assert!(txn.map_remove("m", "f1").unwrap());
        assert!(!txn.map_remove("m", "f1").unwrap());

        assert_eq!(txn.weighted_incr("w", "x", 1).unwrap(), 1);
        assert_eq!(txn.weighted_incr("w", "x", 1).unwrap(), 2);
        txn.weighted_incr("w", "a", 5).unwrap();
        let entries = txn.weighted_entries("w").unwrap();
        assert_eq!(
            entries,
            vec![("x".to_string(), 2), ("a".to_string(), 5)]
        );
        txn.commit().unwrap();
    }

    #[test]
    fn test_delete_drops_every_shape() {
        let (_dir, kv) = open();
        let mut txn = kv.begin().unwrap();
        txn.put("k", "v").unwrap();
        txn.set_add("k", "m").unwrap();
        txn.map_put("k", "f", "v").unwrap();
        txn.weighted_incr("k", "m", 1).unwrap();
        txn.delete("k").unwrap();
        txn.commit().unwrap();

        let mut reader = kv.begin_read().unwrap();
        assert_eq!(reader.get("k").unwrap(), None);
        assert!(reader.set_members("k").unwrap().is_empty());
        assert!(reader.map_entries("k").unwrap().is_empty());
        assert!(reader.weighted_entries("k").unwrap().is_empty());
    }

    #[test]
    fn test_conflicting_writers() {
        let (_dir, kv) = open();
        let mut first = kv.begin().unwrap();
        let mut second = kv.begin().unwrap();

        first.get("counter").unwrap();
        first.put("counter", "1").unwrap();
        second.get("counter").unwrap();
        second.put("counter", "2").unwrap();

        first.commit().unwrap();
        assert!(matches!(second.commit(), Err(KvError::Conflict)));
    }

    #[test]
    fn test_reopen_preserves_data() {
        let dir = TempDir::new().unwrap();
        {
            let kv = RocksKv::open(dir.path()).unwrap();
            let mut txn = kv.begin().unwrap();
            txn.put("k", "v").unwrap();
            txn.commit().unwrap();
        }
        let kv = RocksKv::open(dir.path()).unwrap();
        let mut reader = kv.begin_read().unwrap();
        assert_eq!(reader.get("k").unwrap(), Some("v".to_string()));
    }
}
