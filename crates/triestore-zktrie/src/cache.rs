//! Clean cache: values already confirmed durable on disk.
//!
//! The trie database inserts only after a disk read and removes only keys a
//! commit has just overwritten; eviction is otherwise the cache's business.

use lru::LruCache;
use parking_lot::Mutex;

/// A bounded, thread-safe byte cache.
pub trait CleanCache: Send + Sync {
    /// Copy of the cached value for `key`.
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Cache `value` under `key`, possibly evicting older entries.
    ///
    /// If `value` cannot be cached, any earlier value for `key` is dropped.
    fn set(&self, key: &[u8], value: &[u8]);

    /// Drop `key` if cached.
    fn remove(&self, key: &[u8]);

    /// Number of cached entries.
    fn len(&self) -> usize;

    /// Key plus value bytes held.
    fn size_bytes(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct LruState {
    entries: LruCache<Vec<u8>, Vec<u8>>,
    size: usize,
}

/// LRU cache bounded by total key + value bytes.
///
/// An entry larger than the whole budget is never cached.
pub struct LruCleanCache {
    state: Mutex<LruState>,
    capacity: usize,
}

impl LruCleanCache {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            state: Mutex::new(LruState { entries: LruCache::unbounded(), size: 0 }),
            capacity: capacity_bytes,
        }
    }

    /// Byte budget
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl CleanCache for LruCleanCache {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        let mut state = self.state.lock();
        state.entries.get(key).cloned()
    }

    fn set(&self, key: &[u8], value: &[u8]) {
        let cost = key.len() + value.len();
        let mut state = self.state.lock();
        if cost > self.capacity {
            if let Some(old) = state.entries.pop(key) {
                state.size -= key.len() + old.len();
            }
            return;
        }

        if let Some(old) = state.entries.put(key.to_vec(), value.to_vec()) {
            state.size -= key.len() + old.len();
        }
        state.size += cost;

        while state.size > self.capacity {
            match state.entries.pop_lru() {
                Some((k, v)) => state.size -= k.len() + v.len(),
                None => break,
            }
        }
    }

    fn remove(&self, key: &[u8]) {
        let mut state = self.state.lock();
        if let Some(old) = state.entries.pop(key) {
            state.size -= key.len() + old.len();
        }
    }

    fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    fn size_bytes(&self) -> usize {
        self.state.lock().size
    }
}

impl std::fmt::Debug for LruCleanCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LruCleanCache")
            .field("entries", &state.entries.len())
            .field("size", &state.size)
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get() {
        let cache = LruCleanCache::new(1024);
        assert!(cache.is_empty());
        cache.set(b"node", b"bytes");
        assert_eq!(cache.get(b"node"), Some(b"bytes".to_vec()));
        assert_eq!(cache.get(b"other"), None);
        assert_eq!(cache.size_bytes(), 9);
    }

    #[test]
    fn test_overwrite_keeps_accounting() {
        let cache = LruCleanCache::new(1024);
        cache.set(b"k", b"aaaa");
        cache.set(b"k", b"bb");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.size_bytes(), 3);
        assert_eq!(cache.get(b"k"), Some(b"bb".to_vec()));
    }

    #[test]
    fn test_evicts_least_recent_by_bytes() {
        // Each entry costs 1 + 9 = 10 bytes.
        let cache = LruCleanCache::new(30);
        cache.set(b"a", &[1; 9]);
        cache.set(b"b", &[2; 9]);
        cache.set(b"c", &[3; 9]);
        // Touch "a" so "b" becomes least recent.
        assert!(cache.get(b"a").is_some());
        cache.set(b"d", &[4; 9]);

        assert_eq!(cache.len(), 3);
        assert!(cache.get(b"b").is_none());
        assert!(cache.get(b"a").is_some());
        assert!(cache.get(b"d").is_some());
        assert!(cache.size_bytes() <= cache.capacity());
    }

    #[test]
    fn test_oversized_entry_not_cached() {
        let cache = LruCleanCache::new(8);
        cache.set(b"big", &[0; 16]);
        assert!(cache.is_empty());
        assert_eq!(cache.size_bytes(), 0);
    }

    #[test]
    fn test_oversized_overwrite_drops_old_value() {
        let cache = LruCleanCache::new(64);
        cache.set(b"k", b"old");
        cache.set(b"k", &[7; 100]);
        assert_eq!(cache.get(b"k"), None);
        assert!(cache.is_empty());
        assert_eq!(cache.size_bytes(), 0);
    }

    #[test]
    fn test_remove() {
        let cache = LruCleanCache::new(1024);
        cache.set(b"a", b"1");
        cache.set(b"b", b"22");
        cache.remove(b"a");
        cache.remove(b"missing");
        assert_eq!(cache.get(b"a"), None);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.size_bytes(), 3);
    }
}
