//! Volatile ordered store for tests and throwaway tries.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::format::Op;
use crate::store::{KeyValueStore, KvIterator, SnapshotIterator, WriteBatch};

/// `BTreeMap` behind a `RwLock`. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.ensure_open()?;
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> StoreResult<()> {
        self.ensure_open()?;
        self.data.write().remove(key);
        Ok(())
    }

    fn write(&self, batch: WriteBatch) -> StoreResult<()> {
        self.ensure_open()?;
        let mut data = self.data.write();
        for record in batch.into_records() {
            match record.op {
                Op::Put => {
                    data.insert(record.key, record.value);
                }
                Op::Delete => {
                    data.remove(&record.key);
                }
            }
        }
        Ok(())
    }

    fn new_iterator(&self, prefix: &[u8]) -> Box<dyn KvIterator> {
        if let Err(e) = self.ensure_open() {
            return Box::new(SnapshotIterator::failed(e));
        }
        Box::new(SnapshotIterator::from_map(&self.data.read(), prefix))
    }

    fn close(&self) -> StoreResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(StoreError::Closed);
        }
        self.data.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_delete() {
        let store = MemoryStore::new();
        assert_eq!(store.get(b"k").unwrap(), None);
        store.put(b"k", b"v").unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));
        assert!(store.has(b"k").unwrap());
        store.delete(b"k").unwrap();
        assert!(!store.has(b"k").unwrap());
        store.delete(b"never-there").unwrap();
    }

    #[test]
    fn test_batch_applies_in_order() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.put(b"a", b"1");
        batch.put(b"b", b"2");
        batch.delete(b"a");
        batch.put(b"c", b"3");
        store.write(batch).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(b"a").unwrap(), None);
        assert_eq!(store.get(b"c").unwrap(), Some(b"3".to_vec()));
    }

    #[test]
    fn test_iterator_is_a_snapshot() {
        let store = MemoryStore::new();
        store.put(b"p/1", b"one").unwrap();
        let mut iter = store.new_iterator(b"p/");
        store.put(b"p/2", b"two").unwrap();

        let mut keys = Vec::new();
        while iter.next() {
            keys.push(iter.key().to_vec());
        }
        iter.release();
        assert_eq!(keys, vec![b"p/1".to_vec()]);
    }

    #[test]
    fn test_closed_store_rejects_everything() {
        let store = MemoryStore::new();
        store.put(b"k", b"v").unwrap();
        store.close().unwrap();

        assert!(matches!(store.get(b"k"), Err(StoreError::Closed)));
        assert!(matches!(store.put(b"k", b"v"), Err(StoreError::Closed)));
        assert!(matches!(store.close(), Err(StoreError::Closed)));

        let mut iter = store.new_iterator(b"");
        assert!(!iter.next());
        assert!(matches!(iter.error(), Some(StoreError::Closed)));
    }
}
