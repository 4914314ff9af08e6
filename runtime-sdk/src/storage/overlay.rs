use std::{
    collections::{btree_map, BTreeMap, HashSet},
    iter::Peekable,
};

use super::{Store, StoreIterator};

/// A copy-on-write overlay over a parent store.
pub struct OverlayStore<S: Store> {
    parent: S,
    overlay: BTreeMap<Vec<u8>, Vec<u8>>,
    dirty: HashSet<Vec<u8>>,
}

impl<S: Store> OverlayStore<S> {
    pub fn new(parent: S) -> Self {
        Self {
            parent,
            overlay: BTreeMap::new(),
            dirty: HashSet::new(),
        }
    }

    /// Apply all pending updates to the parent store and return it.
    pub fn commit(mut self) -> S {
        // Insert all items present in the overlay.
        for (key, value) in self.overlay {
            self.dirty.remove(&key);
            self.parent.insert(&key, &value);
        }

        // Any remaining dirty items must have been removed.
        for key in &self.dirty {
            self.parent.remove(key);
        }

        self.parent
    }

    /// Discard all pending updates and return the parent store.
    pub fn rollback(self) -> S {
        self.parent
    }

    /// Parent store.
    pub(super) fn parent(&self) -> &S {
        &self.parent
    }

    /// Whether there are any pending updates.
    pub fn has_pending_updates(&self) -> bool {
        !self.dirty.is_empty()
    }
}

impl<S: Store> Store for OverlayStore<S> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        // For dirty values, check the overlay.
        if self.dirty.contains(key) {
            return self.overlay.get(key).cloned();
        }

        // Otherwise fetch from parent store.
        self.parent.get(key)
    }

    fn insert(&mut self, key: &[u8], value: &[u8]) {
        self.overlay.insert(key.to_owned(), value.to_owned());
        self.dirty.insert(key.to_owned());
    }

    fn remove(&mut self, key: &[u8]) {
        // For dirty values, remove from the overlay.
        if self.dirty.contains(key) {
            self.overlay.remove(key);
            return;
        }

        // Since we don't care about the previous value, we can just record an update.
        self.dirty.insert(key.to_owned());
    }

    fn iter_from(&self, start: &[u8]) -> StoreIterator<'_> {
        Box::new(OverlayStoreIterator {
            store: self,
            parent: self.parent.iter_from(start).peekable(),
            overlay: self.overlay.range(start.to_vec()..).peekable(),
        })
    }
}

/// An iterator over the `OverlayStore`.
struct OverlayStoreIterator<'store, S: Store> {
    store: &'store OverlayStore<S>,
    parent: Peekable<StoreIterator<'store>>,
    overlay: Peekable<btree_map::Range<'store, Vec<u8>, Vec<u8>>>,
}

impl<'store, S: Store> Iterator for OverlayStoreIterator<'store, S> {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        // Skip over any dirty entries from the parent iterator.
        while let Some((key, _)) = self.parent.peek() {
            if !self.store.dirty.contains(key) {
                break;
            }
            self.parent.next();
        }

        // Dirty keys were skipped above so both sides can never yield the same key.
        let take_parent = match (self.parent.peek(), self.overlay.peek()) {
            (Some((p_key, _)), Some((o_key, _))) => p_key < *o_key,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => return None,
        };

        if take_parent {
            self.parent.next()
        } else {
            self.overlay.next().map(|(k, v)| (k.clone(), v.clone()))
        }
    }
}
