//! Dirty write buffer: writes accepted but not yet committed to disk.

use std::collections::BTreeMap;

use triestore_core::WriteBatch;

/// Ordered map of namespaced key to value with byte accounting.
///
/// Not synchronized; the owning `TrieDatabase` guards it with its lock.
#[derive(Debug, Default)]
pub struct WriteBuffer {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
    /// Key plus value bytes currently held
    size: usize,
}

impl WriteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a copy of `key`/`value`, replacing any earlier write.
    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        match self.entries.get_mut(key) {
            Some(existing) => {
                self.size = self.size - existing.len() + value.len();
                existing.clear();
                existing.extend_from_slice(value);
            }
            None => {
                self.size += key.len() + value.len();
                self.entries.insert(key.to_vec(), value.to_vec());
            }
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Key plus value bytes buffered.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Buffered keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.entries.keys().map(Vec::as_slice)
    }

    /// A write batch holding a copy of every buffered entry.
    pub fn to_batch(&self) -> WriteBatch {
        let mut batch = WriteBatch::new();
        for (key, value) in &self.entries {
            batch.put(key, value);
        }
        batch
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.size = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get() {
        let mut buffer = WriteBuffer::new();
        buffer.put(b"key", b"value");
        assert_eq!(buffer.get(b"key"), Some(b"value".as_slice()));
        assert!(buffer.contains(b"key"));
        assert_eq!(buffer.get(b"other"), None);
        assert_eq!(buffer.size(), 8);
    }

    #[test]
    fn test_overwrite_adjusts_size() {
        let mut buffer = WriteBuffer::new();
        buffer.put(b"k", b"short");
        buffer.put(b"k", b"much longer");
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.size(), 1 + 11);
        buffer.put(b"k", b"");
        assert_eq!(buffer.size(), 1);
        assert_eq!(buffer.get(b"k"), Some(b"".as_slice()));
    }

    #[test]
    fn test_batch_then_clear() {
        let mut buffer = WriteBuffer::new();
        buffer.put(b"b", b"2");
        buffer.put(b"a", b"1");
        let batch = buffer.to_batch();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.value_size(), 4);
        assert_eq!(buffer.len(), 2);

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.size(), 0);
    }
}
