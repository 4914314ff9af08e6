use std::collections::BTreeMap;

use super::{Store, StoreIterator};

/// An in-memory ordered key-value store.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    items: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in the store.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the store has no entries.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.items.get(key).cloned()
    }

    fn insert(&mut self, key: &[u8], value: &[u8]) {
        self.items.insert(key.to_vec(), value.to_vec());
    }

    fn remove(&mut self, key: &[u8]) {
        self.items.remove(key);
    }

    fn iter_from(&self, start: &[u8]) -> StoreIterator<'_> {
        Box::new(
            self.items
                .range(start.to_vec()..)
                .map(|(k, v)| (k.clone(), v.clone())),
        )
    }
}
