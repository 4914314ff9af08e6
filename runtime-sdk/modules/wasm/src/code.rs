//! Code caching and storage.
use std::{
    collections::BTreeMap,
    io::{Read, Write},
    num::NonZeroUsize,
    sync::{Arc, Mutex, PoisonError},
};

use wasmd_runtime_sdk::storage::Store;

use crate::{store, types::Checksum, Error};

/// In-memory cache of uncompressed code.
///
/// Unpinned code lives in a bounded LRU cache while pinned code is kept until it is unpinned. The
/// cache is keyed by checksum and code is immutable, so entries never go stale.
pub(crate) struct CodeCache {
    lru: Mutex<lru::LruCache<Checksum, Arc<Vec<u8>>>>,
    pinned: Mutex<BTreeMap<Checksum, Arc<Vec<u8>>>>,
}

impl CodeCache {
    /// Create a new cache holding up to `capacity` unpinned entries.
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            lru: Mutex::new(lru::LruCache::new(capacity)),
            pinned: Mutex::new(BTreeMap::new()),
        }
    }

    /// Loads code with the given checksum, from the cache if possible.
    pub(crate) fn load<S: Store>(&self, state: S, checksum: &Checksum) -> Result<Arc<Vec<u8>>, Error> {
        if let Some(code) = self.pinned.lock().unwrap_or_else(PoisonError::into_inner).get(checksum) {
            return Ok(code.clone());
        }

        let mut cache = self.lru.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(code) = cache.get(checksum) {
            return Ok(code.clone());
        }

        let compressed = store::get_code_bytes(state, checksum)
            .ok_or_else(|| Error::InvalidCode(format!("missing code for checksum {}", checksum)))?;
        let code = Arc::new(decompress(&compressed));

        // Cache uncompressed code for later use.
        cache.put(*checksum, code.clone());

        Ok(code)
    }

    /// Keep the given code in memory until it is unpinned.
    pub(crate) fn pin(&self, checksum: Checksum, code: Arc<Vec<u8>>) {
        self.lru
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop(&checksum);
        self.pinned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(checksum, code);
    }

    /// Return pinned code to the regular LRU cache.
    pub(crate) fn unpin(&self, checksum: &Checksum) {
        let code = self
            .pinned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(checksum);
        if let Some(code) = code {
            self.lru
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .put(*checksum, code);
        }
    }

    /// Whether the given code is pinned in memory.
    #[cfg(test)]
    pub(crate) fn is_pinned(&self, checksum: &Checksum) -> bool {
        self.pinned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(checksum)
    }
}

/// Stores code under its checksum unless identical code is already stored.
pub(crate) fn store_code<S: Store>(mut state: S, checksum: &Checksum, code: &[u8]) -> Result<(), Error> {
    if store::get_code_bytes(&mut state, checksum).is_some() {
        return Ok(());
    }
    store::insert_code_bytes(state, checksum, &compress(code)?);
    Ok(())
}

fn compress(code: &[u8]) -> Result<Vec<u8>, Error> {
    let mut encoder = snap::write::FrameEncoder::new(Vec::with_capacity(code.len()));
    encoder
        .write_all(code)
        .map_err(|err| Error::InvalidCode(format!("failed to compress code: {}", err)))?;
    encoder
        .into_inner()
        .map_err(|_| Error::InvalidCode("failed to compress code".to_string()))
}

fn decompress(data: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(data.len());
    snap::read::FrameDecoder::new(data)
        .read_to_end(&mut output)
        .unwrap_or_else(|err| panic!("corrupted code in storage: {}", err));
    output
}
