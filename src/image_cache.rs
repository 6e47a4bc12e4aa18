use std::num::NonZeroUsize;
use std::sync::Mutex;

use bytes::Bytes;

use crate::DEFAULT_IMAGE_CACHE_CAPACITY;

/// In-memory image cache consulted before any network or storage I/O.
/// Eviction strategy is up to the implementation, but growth must stay
/// bounded.
pub trait ImageCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Bytes>;
    fn put(&self, key: &str, value: Bytes);
}

/// Bounded least-recently-used cache keyed by image URL.
pub struct LruImageCache {
    entries: Mutex<lru::LruCache<String, Bytes>>,
}

impl LruImageCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .unwrap_or_else(|| NonZeroUsize::new(DEFAULT_IMAGE_CACHE_CAPACITY).unwrap());
        Self {
            entries: Mutex::new(lru::LruCache::new(capacity)),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LruImageCache {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_CACHE_CAPACITY)
    }
}

impl ImageCache for LruImageCache {
    fn get(&self, key: &str) -> Option<Bytes> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn put(&self, key: &str, value: Bytes) {
        self.entries.lock().unwrap().put(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_returns_bytes() {
        let cache = LruImageCache::new(4);
        cache.put("a", Bytes::from_static(b"img"));
        assert_eq!(cache.get("a"), Some(Bytes::from_static(b"img")));
        assert_eq!(cache.get("b"), None);
    }

    #[test]
    fn evicts_least_recently_used_beyond_capacity() {
        let cache = LruImageCache::new(2);
        cache.put("a", Bytes::from_static(b"1"));
        cache.put("b", Bytes::from_static(b"2"));
        cache.put("c", Bytes::from_static(b"3"));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn get_refreshes_recency() {
        let cache = LruImageCache::new(2);
        cache.put("a", Bytes::from_static(b"1"));
        cache.put("b", Bytes::from_static(b"2"));

        // Touch "a" so "b" becomes the eviction candidate.
        cache.get("a");
        cache.put("c", Bytes::from_static(b"3"));

        assert!(cache.get("a").is_some());
        assert_eq!(cache.get("b"), None);
    }

    #[test]
    fn zero_capacity_falls_back_to_default() {
        let cache = LruImageCache::new(0);
        cache.put("a", Bytes::from_static(b"1"));
        assert!(cache.get("a").is_some());
    }
}
