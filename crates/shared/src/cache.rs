use crate::hash::ContentHash;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Default number of decoded thumbnails kept in memory.
pub const DEFAULT_MEMORY_THUMBNAILS: usize = 200;

/// Count-bounded in-memory thumbnail cache keyed by content hash.
///
/// Clones share the same underlying cache.
#[derive(Debug)]
pub struct ThumbnailCache<V> {
    cache: Arc<Mutex<LruCache<ContentHash, V>>>,
}

impl<V> Clone for ThumbnailCache<V> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<V: Clone> ThumbnailCache<V> {
    /// A cache holding at most `capacity` entries, minimum one.
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(non_zero(capacity)))),
        }
    }

    /// Returns a clone and marks the entry most recently used.
    pub fn get(&self, key: &ContentHash) -> Option<V> {
        self.cache.lock().ok()?.get(key).cloned()
    }

    pub fn contains(&self, key: &ContentHash) -> bool {
        self.cache
            .lock()
            .map(|cache| cache.contains(key))
            .unwrap_or(false)
    }

    /// Inserts or replaces, returning the previous value for the key.
    pub fn put(&self, key: ContentHash, value: V) -> Option<V> {
        self.cache.lock().ok()?.put(key, value)
    }

    pub fn remove(&self, key: &ContentHash) -> Option<V> {
        self.cache.lock().ok()?.pop(key)
    }

    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    /// Evicts from the cold end when shrinking.
    pub fn resize(&self, capacity: usize) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.resize(non_zero(capacity));
        }
    }

    pub fn len(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.cache
            .lock()
            .map(|cache| cache.cap().get())
            .unwrap_or(0)
    }
}

impl<V: Clone> Default for ThumbnailCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_THUMBNAILS)
    }
}

fn non_zero(capacity: usize) -> NonZeroUsize {
    NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN)
}
