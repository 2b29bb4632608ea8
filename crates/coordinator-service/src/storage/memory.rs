//! In-memory ordered storage backend.

use super::{Storage, StorageError, StoredValue};
use std::collections::BTreeMap;
use std::ops::Bound;
use tracing::trace;

/// `BTreeMap`-backed [`Storage`]; ordering makes prefix scans a range walk.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: BTreeMap<String, StoredValue>,
}

impl MemoryStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn prefix_range<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a StoredValue)> + 'a {
        self.entries
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(key, _)| key.starts_with(prefix))
    }
}

impl Storage for MemoryStorage {
    fn get(&mut self, key: &str, now_ms: u64) -> Result<Option<serde_json::Value>, StorageError> {
        match self.entries.get(key) {
            None => return Ok(None),
            Some(stored) if !stored.is_expired(now_ms) => return Ok(Some(stored.value.clone())),
            Some(_) => {}
        }

        // Lazy eviction on read.
        self.entries.remove(key);
        trace!(target: "coord.storage", "Evicted expired entry on read");
        Ok(None)
    }

    fn put(&mut self, key: &str, value: StoredValue) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<bool, StorageError> {
        Ok(self.entries.remove(key).is_some())
    }

    fn list_prefix(&mut self, prefix: &str, now_ms: u64) -> Result<Vec<String>, StorageError> {
        Ok(self
            .prefix_range(prefix)
            .filter(|(_, stored)| !stored.is_expired(now_ms))
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn sweep_expired(&mut self, now_ms: u64) -> Result<usize, StorageError> {
        let before = self.entries.len();
        self.entries.retain(|_, stored| !stored.is_expired(now_ms));
        Ok(before - self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
