//! Storage.
mod memory;
mod nested;
mod overlay;
mod prefix;
mod typed;

/// An ordered iterator over key/value pairs of a store.
pub type StoreIterator<'store> = Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'store>;

/// A key-value store.
pub trait Store {
    /// Fetch entry with given key.
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Update entry with given key to the given value.
    fn insert(&mut self, key: &[u8], value: &[u8]);

    /// Remove entry with given key.
    fn remove(&mut self, key: &[u8]);

    /// Returns an iterator over all entries with keys equal to or greater than `start`, in
    /// ascending key order.
    fn iter_from(&self, start: &[u8]) -> StoreIterator<'_>;

    /// Returns an iterator over the whole store.
    fn iter(&self) -> StoreIterator<'_> {
        self.iter_from(&[])
    }
}

impl<S: Store + ?Sized> Store for &mut S {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        S::get(self, key)
    }

    fn insert(&mut self, key: &[u8], value: &[u8]) {
        S::insert(self, key, value)
    }

    fn remove(&mut self, key: &[u8]) {
        S::remove(self, key)
    }

    fn iter_from(&self, start: &[u8]) -> StoreIterator<'_> {
        S::iter_from(self, start)
    }
}

impl<S: Store + ?Sized> Store for Box<S> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        S::get(self, key)
    }

    fn insert(&mut self, key: &[u8], value: &[u8]) {
        S::insert(self, key, value)
    }

    fn remove(&mut self, key: &[u8]) {
        S::remove(self, key)
    }

    fn iter_from(&self, start: &[u8]) -> StoreIterator<'_> {
        S::iter_from(self, start)
    }
}

pub use memory::MemoryStore;
pub use nested::NestedStore;
pub use overlay::OverlayStore;
pub use prefix::PrefixStore;
pub use typed::{TypedStore, TypedStoreIterator};

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_prefix_store() {
        let mut root = MemoryStore::new();
        root.insert(b"a/1", b"one");
        root.insert(b"b/1", b"other");

        let mut store = PrefixStore::new(&mut root, b"a/");
        store.insert(b"2", b"two");
        assert_eq!(store.get(b"1"), Some(b"one".to_vec()));
        assert_eq!(store.get(b"3"), None);

        let items: Vec<_> = store.iter().collect();
        assert_eq!(
            items,
            vec![
                (b"1".to_vec(), b"one".to_vec()),
                (b"2".to_vec(), b"two".to_vec()),
            ]
        );

        let items: Vec<_> = store.iter_from(b"2").collect();
        assert_eq!(items, vec![(b"2".to_vec(), b"two".to_vec())]);

        assert_eq!(root.get(b"a/2"), Some(b"two".to_vec()));
    }

    #[test]
    fn test_overlay_store() {
        let mut root = MemoryStore::new();
        root.insert(b"key1", b"value1");
        root.insert(b"key2", b"value2");
        root.insert(b"key4", b"value4");

        let mut overlay = OverlayStore::new(&mut root);
        overlay.insert(b"key3", b"value3");
        overlay.remove(b"key2");
        overlay.insert(b"key4", b"updated4");
        assert_eq!(overlay.get(b"key2"), None);
        assert_eq!(overlay.get(b"key3"), Some(b"value3".to_vec()));

        let items: Vec<_> = overlay.iter().collect();
        assert_eq!(
            items,
            vec![
                (b"key1".to_vec(), b"value1".to_vec()),
                (b"key3".to_vec(), b"value3".to_vec()),
                (b"key4".to_vec(), b"updated4".to_vec()),
            ]
        );

        // Removing an overlay-only key must not resurrect anything from the parent.
        overlay.remove(b"key3");
        assert_eq!(overlay.get(b"key3"), None);

        let root = overlay.commit();
        assert_eq!(root.get(b"key1"), Some(b"value1".to_vec()));
        assert_eq!(root.get(b"key2"), None);
        assert_eq!(root.get(b"key3"), None);
        assert_eq!(root.get(b"key4"), Some(b"updated4".to_vec()));
    }

    #[test]
    fn test_overlay_store_rollback() {
        let mut root = MemoryStore::new();
        root.insert(b"key1", b"value1");

        let mut overlay = OverlayStore::new(&mut root);
        overlay.insert(b"key1", b"changed");
        overlay.insert(b"key2", b"value2");
        assert!(overlay.has_pending_updates());

        let root = overlay.rollback();
        assert_eq!(root.get(b"key1"), Some(b"value1".to_vec()));
        assert_eq!(root.get(b"key2"), None);
    }

    #[test]
    fn test_nested_store() {
        let mut store = NestedStore::new(Box::new(MemoryStore::new()));
        store.insert(b"base", b"1");

        store.open();
        store.insert(b"child", b"2");
        store.open();
        store.insert(b"grandchild", b"3");
        assert_eq!(store.depth(), 2);
        store.rollback();
        assert_eq!(store.get(b"grandchild"), None);
        store.commit();
        assert_eq!(store.depth(), 0);

        let root = store.into_root();
        assert_eq!(root.get(b"base"), Some(b"1".to_vec()));
        assert_eq!(root.get(b"child"), Some(b"2".to_vec()));
        assert_eq!(root.get(b"grandchild"), None);
    }

    #[test]
    fn test_typed_store() {
        let mut root = MemoryStore::new();
        let mut store = TypedStore::new(&mut root);
        store.insert(b"a", 10u64);
        store.insert(b"b", 20u64);

        assert_eq!(store.get::<_, u64>(b"a"), Some(10));
        assert_eq!(store.get::<_, u64>(b"missing"), None);

        let values: Vec<u64> = store.iter::<Vec<u8>, u64>().map(|(_, v)| v).collect();
        assert_eq!(values, vec![10, 20]);
    }
}
