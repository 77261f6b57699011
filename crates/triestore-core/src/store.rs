//! The key-value store contract shared by every engine.
//!
//! Stores are ordered: iteration yields keys in ascending byte order.
//! Cursors are obtained per prefix and must be released by the caller.

use std::collections::BTreeMap;

use crate::error::{StoreError, StoreResult};
use crate::format::Record;

/// An ordered, prefix-iterable key-value store.
///
/// All methods take `&self`; implementations synchronize internally.
pub trait KeyValueStore: Send + Sync {
    /// Value stored under `key`, or `None` if absent.
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Whether `key` is present.
    fn has(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Insert or overwrite `key`.
    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Remove `key`. Removing an absent key is not an error.
    fn delete(&self, key: &[u8]) -> StoreResult<()>;

    /// Apply every operation in `batch` as one unit.
    fn write(&self, batch: WriteBatch) -> StoreResult<()>;

    /// Cursor over all entries whose key starts with `prefix`.
    ///
    /// An empty prefix covers the whole store. Failures (including a
    /// closed store) surface through [`KvIterator::error`].
    fn new_iterator(&self, prefix: &[u8]) -> Box<dyn KvIterator>;

    /// Release the store. Every later call fails with `Closed`.
    fn close(&self) -> StoreResult<()>;
}

/// A forward cursor in the style of the LevelDB iterator.
pub trait KvIterator {
    /// Advance to the next entry. Returns false when exhausted or released.
    fn next(&mut self) -> bool;

    /// Key at the current position. Empty before the first `next`.
    fn key(&self) -> &[u8];

    /// Value at the current position. Empty before the first `next`.
    fn value(&self) -> &[u8];

    /// Free the cursor's resources. `next` returns false afterwards.
    fn release(&mut self);

    /// Error accumulated by the cursor, still readable after `release`.
    fn error(&self) -> Option<StoreError>;
}

/// A group of writes applied together by [`KeyValueStore::write`].
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    records: Vec<Record>,
    size: usize,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.size += key.len() + value.len();
        self.records.push(Record::put(key, value));
    }

    pub fn delete(&mut self, key: &[u8]) {
        self.size += key.len();
        self.records.push(Record::delete(key));
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Key and value bytes queued so far.
    pub fn value_size(&self) -> usize {
        self.size
    }

    pub(crate) fn into_records(self) -> Vec<Record> {
        self.records
    }
}

/// Cursor over a copy of the matching entries taken when it was opened.
///
/// Writes made after the cursor was created are not visible through it.
pub struct SnapshotIterator {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    /// Index of the current entry plus one; zero before the first `next`.
    position: usize,
    released: bool,
    error: Option<StoreError>,
}

impl SnapshotIterator {
    /// Snapshot the entries of `map` under `prefix`.
    pub fn from_map(map: &BTreeMap<Vec<u8>, Vec<u8>>, prefix: &[u8]) -> Self {
        let entries = map
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Self { entries, position: 0, released: false, error: None }
    }

    /// A cursor that yields nothing and reports `error`.
    pub fn failed(error: StoreError) -> Self {
        Self { entries: Vec::new(), position: 0, released: false, error: Some(error) }
    }

    fn current(&self) -> Option<&(Vec<u8>, Vec<u8>)> {
        if self.released || self.position == 0 {
            return None;
        }
        self.entries.get(self.position - 1)
    }
}

impl KvIterator for SnapshotIterator {
    fn next(&mut self) -> bool {
        if self.released || self.error.is_some() || self.position >= self.entries.len() {
            return false;
        }
        self.position += 1;
        true
    }

    fn key(&self) -> &[u8] {
        match self.current() {
            Some((key, _)) => key.as_slice(),
            None => &[],
        }
    }

    fn value(&self) -> &[u8] {
        match self.current() {
            Some((_, value)) => value.as_slice(),
            None => &[],
        }
    }

    fn release(&mut self) {
        self.released = true;
        self.entries = Vec::new();
    }

    fn error(&self) -> Option<StoreError> {
        self.error.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BTreeMap<Vec<u8>, Vec<u8>> {
        let mut map = BTreeMap::new();
        map.insert(b"a/1".to_vec(), b"one".to_vec());
        map.insert(b"a/2".to_vec(), b"two".to_vec());
        map.insert(b"b/1".to_vec(), b"other".to_vec());
        map.insert(b"a".to_vec(), b"bare".to_vec());
        map
    }

    fn drain(iter: &mut dyn KvIterator) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut out = Vec::new();
        while iter.next() {
            out.push((iter.key().to_vec(), iter.value().to_vec()));
        }
        out
    }

    #[test]
    fn test_prefix_scoped_and_ordered() {
        let mut iter = SnapshotIterator::from_map(&sample(), b"a/");
        let entries = drain(&mut iter);
        assert_eq!(
            entries,
            vec![
                (b"a/1".to_vec(), b"one".to_vec()),
                (b"a/2".to_vec(), b"two".to_vec()),
            ]
        );
        assert!(iter.error().is_none());
    }

    #[test]
    fn test_empty_prefix_covers_everything() {
        let mut iter = SnapshotIterator::from_map(&sample(), b"");
        assert_eq!(drain(&mut iter).len(), 4);
    }

    #[test]
    fn test_position_before_next_is_empty() {
        let iter = SnapshotIterator::from_map(&sample(), b"a/");
        assert!(iter.key().is_empty());
        assert!(iter.value().is_empty());
    }

    #[test]
    fn test_release_stops_iteration() {
        let mut iter = SnapshotIterator::from_map(&sample(), b"");
        assert!(iter.next());
        iter.release();
        assert!(!iter.next());
        assert!(iter.key().is_empty());
    }

    #[test]
    fn test_failed_cursor_keeps_error_after_release() {
        let mut iter = SnapshotIterator::failed(StoreError::Closed);
        assert!(!iter.next());
        iter.release();
        assert!(matches!(iter.error(), Some(StoreError::Closed)));
    }

    #[test]
    fn test_write_batch_accounting() {
        let mut batch = WriteBatch::new();
        assert!(batch.is_empty());
        batch.put(b"key", b"value");
        batch.delete(b"old");
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.value_size(), 3 + 5 + 3);
    }
}
