use std::mem;

use super::{MemoryStore, OverlayStore, Store, StoreIterator};

/// A stack of overlays on top of a root store.
///
/// Each `open` pushes a fresh overlay; `commit` merges the topmost overlay into the level below
/// while `rollback` discards it.
pub enum NestedStore {
    Root(Box<dyn Store>),
    Layer(Box<OverlayStore<NestedStore>>),
}

impl NestedStore {
    /// Create a new nested store over the given root store.
    pub fn new(root: Box<dyn Store>) -> Self {
        NestedStore::Root(root)
    }

    /// Open a new overlay level.
    pub fn open(&mut self) {
        let parent = mem::replace(self, Self::placeholder());
        *self = NestedStore::Layer(Box::new(OverlayStore::new(parent)));
    }

    /// Merge the topmost overlay into its parent level.
    ///
    /// # Panics
    ///
    /// This method will panic when called on the root level.
    pub fn commit(&mut self) {
        self.close(true)
    }

    /// Discard the topmost overlay.
    ///
    /// # Panics
    ///
    /// This method will panic when called on the root level.
    pub fn rollback(&mut self) {
        self.close(false)
    }

    /// Number of open overlay levels.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self;
        while let NestedStore::Layer(overlay) = current {
            depth += 1;
            current = overlay.parent();
        }
        depth
    }

    /// Return the root store.
    ///
    /// # Panics
    ///
    /// This method will panic when there are open overlay levels.
    pub fn into_root(self) -> Box<dyn Store> {
        match self {
            NestedStore::Root(root) => root,
            NestedStore::Layer(_) => panic!("cannot take root store with open levels"),
        }
    }

    fn close(&mut self, commit: bool) {
        if let NestedStore::Root(_) = self {
            panic!("cannot close the root store level");
        }

        *self = match mem::replace(self, Self::placeholder()) {
            NestedStore::Layer(overlay) if commit => overlay.commit(),
            NestedStore::Layer(overlay) => overlay.rollback(),
            NestedStore::Root(root) => NestedStore::Root(root),
        };
    }

    fn placeholder() -> Self {
        NestedStore::Root(Box::new(MemoryStore::new()))
    }
}

impl Store for NestedStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self {
            NestedStore::Root(root) => root.get(key),
            NestedStore::Layer(overlay) => overlay.get(key),
        }
    }

    fn insert(&mut self, key: &[u8], value: &[u8]) {
        match self {
            NestedStore::Root(root) => root.insert(key, value),
            NestedStore::Layer(overlay) => overlay.insert(key, value),
        }
    }

    fn remove(&mut self, key: &[u8]) {
        match self {
            NestedStore::Root(root) => root.remove(key),
            NestedStore::Layer(overlay) => overlay.remove(key),
        }
    }

    fn iter_from(&self, start: &[u8]) -> StoreIterator<'_> {
        match self {
            NestedStore::Root(root) => root.iter_from(start),
            NestedStore::Layer(overlay) => overlay.iter_from(start),
        }
    }
}
