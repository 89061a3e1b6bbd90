//! Property maps and their derived indexes.
//!
//! Two index families are kept per entity kind: the forward index (ids
//! with a field set, regardless of value) and the composite index (ids
//! whose field equals a value exactly). Both are derived state, with the
//! property map authoritative, and every write re-derives them in the
//! same transaction, so an id appears in an index entry iff the map
//! currently carries that field/value. Equality is exact byte equality;
//! values are never normalized.

use regex::Regex;
use rustc_hash::FxHashSet;
use std::collections::HashMap;

use crate::kv::KvTxn;

use super::keys::KeySpace;
use super::store::{parse_id, GraphError, GraphResult};
use super::types::EntityKind;

/// Maintains property maps, forward/composite indexes and the scan paths.
pub struct PropertyIndexer {
    keys: KeySpace,
}

impl PropertyIndexer {
    pub(crate) fn new(keys: KeySpace) -> Self {
        PropertyIndexer { keys }
    }

    /// Write `field = value`, deindexing any previous value first.
    pub fn set(
        &self,
        txn: &mut impl KvTxn,
        kind: EntityKind,
        id: u64,
        field: &str,
        value: &str,
    ) -> GraphResult<()> {
        let props_key = self.keys.props(kind, id);
        let member = id.to_string();
        if let Some(old) = txn.map_get(&props_key, field)? {
            txn.set_remove(&self.keys.forward_index(kind, field), &member)?;
            txn.set_remove(&self.keys.composite_index(kind, field, &old), &member)?;
        }
        txn.map_put(&props_key, field, value)?;
        txn.set_add(&self.keys.forward_index(kind, field), &member)?;
        txn.set_add(&self.keys.composite_index(kind, field, value), &member)?;
        Ok(())
    }

    /// Remove `field`, failing if it was never set.
    pub fn remove(
        &self,
        txn: &mut impl KvTxn,
        kind: EntityKind,
        id: u64,
        field: &str,
    ) -> GraphResult<()> {
        let props_key = self.keys.props(kind, id);
        let old = txn
            .map_get(&props_key, field)?
            .ok_or_else(|| GraphError::PropertyNotFound(field.to_string()))?;
        txn.map_remove(&props_key, field)?;
        let member = id.to_string();
        txn.set_remove(&self.keys.forward_index(kind, field), &member)?;
        txn.set_remove(&self.keys.composite_index(kind, field, &old), &member)?;
        Ok(())
    }

    /// Current value of `field`, failing if it is not set.
    pub fn get(
        &self,
        txn: &mut impl KvTxn,
        kind: EntityKind,
        id: u64,
        field: &str,
    ) -> GraphResult<String> {
        txn.map_get(&self.keys.props(kind, id), field)?
            .ok_or_else(|| GraphError::PropertyNotFound(field.to_string()))
    }

    /// Full property snapshot.
    pub fn dump(
        &self,
        txn: &mut impl KvTxn,
        kind: EntityKind,
        id: u64,
    ) -> GraphResult<HashMap<String, String>> {
        Ok(txn
            .map_entries(&self.keys.props(kind, id))?
            .into_iter()
            .collect())
    }

    /// Remove every index entry for the entity and drop its property map.
    /// Used by the delete cascades.
    pub fn deindex_all(&self, txn: &mut impl KvTxn, kind: EntityKind, id: u64) -> GraphResult<()> {
        let props_key = self.keys.props(kind, id);
        let member = id.to_string();
        for (field, value) in txn.map_entries(&props_key)? {
            txn.set_remove(&self.keys.forward_index(kind, &field), &member)?;
            txn.set_remove(&self.keys.composite_index(kind, &field, &value), &member)?;
        }
        txn.delete(&props_key)?;
        Ok(())
    }

    /// Ids whose properties equal every `(field, value)` pair exactly.
    /// Empty criteria match nothing.
    pub fn exact_match(
        &self,
        txn: &mut impl KvTxn,
        kind: EntityKind,
        criteria: &[(&str, &str)],
    ) -> GraphResult<FxHashSet<u64>> {
        let mut result: Option<FxHashSet<u64>> = None;
        for &(field, value) in criteria {
            let members = txn.set_members(&self.keys.composite_index(kind, field, value))?;
            let mut ids = FxHashSet::default();
            for raw in &members {
                ids.insert(parse_id(raw)?);
            }
            result = Some(match result {
                None => ids,
                Some(acc) => acc.intersection(&ids).copied().collect(),
            });
            if result.as_ref().is_some_and(|ids| ids.is_empty()) {
                break;
            }
        }
        Ok(result.unwrap_or_default())
    }

    /// Ids whose properties match every `(field, pattern)` pair.
    ///
    /// Patterns use unanchored search semantics. Composite indexes are
    /// exact-value only, so this path scans: each field costs a pass over
    /// its forward set plus one value fetch per candidate.
    pub fn regex_match(
        &self,
        txn: &mut impl KvTxn,
        kind: EntityKind,
        criteria: &[(&str, &str)],
    ) -> GraphResult<FxHashSet<u64>> {
        let mut compiled = Vec::with_capacity(criteria.len());
        for &(field, pattern) in criteria {
            compiled.push((field, Regex::new(pattern)?));
        }

        let mut result: Option<FxHashSet<u64>> = None;
        for (field, re) in &compiled {
            let mut matched = FxHashSet::default();
            for raw in txn.set_members(&self.keys.forward_index(kind, field))? {
                let id = parse_id(&raw)?;
                if let Some(value) = txn.map_get(&self.keys.props(kind, id), field)? {
                    if re.is_match(&value) {
                        matched.insert(id);
                    }
                }
            }
            result = Some(match result {
                None => matched,
                Some(acc) => acc.intersection(&matched).copied().collect(),
            });
            if result.as_ref().is_some_and(|ids| ids.is_empty()) {
                break;
            }
        }
        Ok(result.unwrap_or_default())
    }
}
