//! Unordered associative fallback.
//!
//! The baseline variant behind the same contract as the trees: no
//! ordering invariant, no balancing, range scan is a linear filter in no
//! guaranteed order. Every key that passes through is deduplicated via
//! the shared intern pool so equal key strings share one backing
//! allocation process-wide; callers never observe the difference.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{KeyExistsSnafu, KeyNotFoundSnafu, Result};
use crate::index::{IndexKind, OrderedIndex};
use crate::intern::InternPool;
use crate::persist;

/// Flat hash-table index.
#[derive(Debug)]
pub struct FlatIndex<V> {
    data: HashMap<Arc<str>, V>,
    pool: Arc<InternPool>,
}

impl<V> FlatIndex<V> {
    /// Creates an empty index drawing keys from `pool`.
    pub fn new(pool: Arc<InternPool>) -> Self {
        Self { data: HashMap::new(), pool }
    }

    /// Number of entries stored.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Adds a new binding.
    pub fn insert(&mut self, key: &str, value: V) -> Result<()> {
        let key = self.pool.intern(key);
        if self.data.contains_key(&key) {
            return KeyExistsSnafu { key: &*key }.fail();
        }
        self.data.insert(key, value);
        Ok(())
    }

    /// Returns the value bound to `key`.
    pub fn get(&self, key: &str) -> Result<&V> {
        let key = self.pool.intern(key);
        self.data.get(&key).ok_or_else(|| KeyNotFoundSnafu { key: &*key }.build())
    }

    /// Replaces the value bound to an existing key.
    pub fn update(&mut self, key: &str, value: V) -> Result<()> {
        let key = self.pool.intern(key);
        match self.data.get_mut(&key) {
            Some(slot) => {
                *slot = value;
                Ok(())
            },
            None => KeyNotFoundSnafu { key: &*key }.fail(),
        }
    }

    /// Removes a binding.
    pub fn remove(&mut self, key: &str) -> Result<()> {
        let key = self.pool.intern(key);
        match self.data.remove(&key) {
            Some(_) => Ok(()),
            None => KeyNotFoundSnafu { key: &*key }.fail(),
        }
    }

    /// Keys within `[min, max]`, both bounds inclusive, in no particular
    /// order.
    pub fn range(&self, min: &str, max: &str) -> Vec<String> {
        let min = self.pool.intern(min);
        let max = self.pool.intern(max);
        self.data
            .keys()
            .filter(|k| k.as_ref() >= &*min && k.as_ref() <= &*max)
            .map(|k| k.to_string())
            .collect()
    }
}

impl<V> OrderedIndex<V> for FlatIndex<V>
where
    V: Serialize + DeserializeOwned,
{
    fn kind(&self) -> IndexKind {
        IndexKind::Flat
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn insert(&mut self, key: &str, value: V) -> Result<()> {
        Self::insert(self, key, value)
    }

    fn get(&self, key: &str) -> Result<&V> {
        Self::get(self, key)
    }

    fn range(&self, min: &str, max: &str) -> Vec<String> {
        Self::range(self, min, max)
    }

    fn update(&mut self, key: &str, value: V) -> Result<()> {
        Self::update(self, key, value)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        Self::remove(self, key)
    }

    fn save(&self, dest: &mut dyn io::Write) -> Result<()> {
        // Sorted for a deterministic document; the in-memory table stays
        // unordered.
        let doc: BTreeMap<&str, &V> = self.data.iter().map(|(k, v)| (k.as_ref(), v)).collect();
        persist::write_document(dest, persist::FLAT_FORMAT, &doc)
    }

    fn load(&mut self, src: &mut dyn io::Read) -> Result<()> {
        let doc: BTreeMap<String, V> = persist::read_document(src, persist::FLAT_FORMAT)?;
        let mut data = HashMap::with_capacity(doc.len());
        for (key, value) in doc {
            data.insert(self.pool.intern(&key), value);
        }
        self.data = data;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_index() -> FlatIndex<u64> {
        FlatIndex::new(Arc::new(InternPool::new()))
    }

    #[test]
    fn test_insert_and_get() {
        let mut index = new_index();
        index.insert("a", 1).unwrap();
        index.insert("b", 2).unwrap();
        assert_eq!(index.get("a").unwrap(), &1);
        assert_eq!(index.get("b").unwrap(), &2);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_duplicate_insert_keeps_original() {
        let mut index = new_index();
        index.insert("x", 1).unwrap();
        let err = index.insert("x", 2).unwrap_err();
        assert!(matches!(err, crate::Error::KeyExists { .. }));
        assert_eq!(index.get("x").unwrap(), &1);
    }

    #[test]
    fn test_update_and_remove_reject_missing() {
        let mut index = new_index();
        assert!(index.update("ghost", 0).is_err());
        assert!(index.remove("ghost").is_err());
        index.insert("k", 1).unwrap();
        index.update("k", 2).unwrap();
        assert_eq!(index.get("k").unwrap(), &2);
        index.remove("k").unwrap();
        assert!(index.get("k").is_err());
    }

    #[test]
    fn test_range_is_inclusive_filter() {
        let mut index = new_index();
        for key in ["b", "a", "d", "c"] {
            index.insert(key, 0).unwrap();
        }
        let mut keys = index.range("a", "c");
        keys.sort();
        assert_eq!(keys, ["a", "b", "c"]);
        assert!(index.range("d", "a").is_empty());
    }

    #[test]
    fn test_pool_shared_across_indexes() {
        let pool = Arc::new(InternPool::new());
        let mut first: FlatIndex<u64> = FlatIndex::new(Arc::clone(&pool));
        let mut second: FlatIndex<u64> = FlatIndex::new(Arc::clone(&pool));

        first.insert("shared", 1).unwrap();
        second.insert("shared", 2).unwrap();

        // Both indexes point at the same pooled allocation
        assert_eq!(pool.len(), 1);
        let a = first.data.keys().next().unwrap();
        let b = second.data.keys().next().unwrap();
        assert!(Arc::ptr_eq(a, b));
    }
}
