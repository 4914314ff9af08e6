use super::{Store, StoreIterator};

/// A key-value store that prefixes all keys with the given prefix.
pub struct PrefixStore<S: Store, P: AsRef<[u8]>> {
    parent: S,
    prefix: P,
}

impl<S: Store, P: AsRef<[u8]>> PrefixStore<S, P> {
    /// Create a new prefix store with the given prefix.
    pub fn new(parent: S, prefix: P) -> Self {
        Self { parent, prefix }
    }
}

impl<S: Store, P: AsRef<[u8]>> Store for PrefixStore<S, P> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.parent.get(&[self.prefix.as_ref(), key].concat())
    }

    fn insert(&mut self, key: &[u8], value: &[u8]) {
        self.parent
            .insert(&[self.prefix.as_ref(), key].concat(), value);
    }

    fn remove(&mut self, key: &[u8]) {
        self.parent.remove(&[self.prefix.as_ref(), key].concat());
    }

    fn iter_from(&self, start: &[u8]) -> StoreIterator<'_> {
        let prefix = self.prefix.as_ref();
        Box::new(PrefixStoreIterator {
            inner: self.parent.iter_from(&[prefix, start].concat()),
            prefix,
        })
    }
}

/// An iterator over the `PrefixStore`.
struct PrefixStoreIterator<'store> {
    inner: StoreIterator<'store>,
    prefix: &'store [u8],
}

impl<'store> Iterator for PrefixStoreIterator<'store> {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        // Keys are ordered so the first key without the prefix ends the iteration.
        self.inner.next().and_then(|(mut k, v)| {
            if k.starts_with(self.prefix) {
                Some((k.split_off(self.prefix.len()), v))
            } else {
                None
            }
        })
    }
}
