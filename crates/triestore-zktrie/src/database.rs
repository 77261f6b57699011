//! Shared trie database: the state every namespaced adaptor works on.
//!
//! One `TrieDatabase` owns the disk handle, the dirty write buffer and its
//! lock, the optional clean cache, the optional preimage store and the cache
//! meters. Adaptors hold an `Arc` to it plus their own prefix.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use hashbrown::HashMap;
use log::{info, warn};
use parking_lot::RwLock;

use triestore_core::KeyValueStore;

use crate::buffer::WriteBuffer;
use crate::cache::{CleanCache, LruCleanCache};
use crate::config::TrieDbConfig;
use crate::error::{TrieDbError, TrieDbResult};
use crate::hash::Hash;
use crate::meters::{CacheMeters, CacheStats};
use crate::preimage::PreimageStore;

/// Outcome of [`TrieDatabase::commit`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
    /// Buffered nodes written to disk
    pub nodes: usize,
    /// Key plus value bytes written
    pub bytes: usize,
    /// Preimages written to disk
    pub preimages: usize,
}

/// Write buffer + clean cache + disk, shared by every adaptor on one store.
pub struct TrieDatabase {
    diskdb: Arc<dyn KeyValueStore>,
    /// Pending writes; Put takes it exclusively, Get only shared
    dirties: RwLock<WriteBuffer>,
    /// Bumped by every commit that wrote nodes, under the dirties write lock
    epoch: AtomicU64,
    cleans: Option<Arc<dyn CleanCache>>,
    preimages: Option<PreimageStore>,
    meters: CacheMeters,
}

impl TrieDatabase {
    /// Open a trie database over `diskdb`.
    ///
    /// A clean cache is created when `clean_cache_bytes > 0`, a preimage
    /// store when `preimages` is set.
    pub fn new(diskdb: Arc<dyn KeyValueStore>, config: TrieDbConfig) -> TrieDbResult<Self> {
        config.validate().map_err(TrieDbError::InvalidConfig)?;

        let cleans = if config.clean_cache_bytes > 0 {
            Some(Arc::new(LruCleanCache::new(config.clean_cache_bytes)) as Arc<dyn CleanCache>)
        } else {
            None
        };
        let preimages = config
            .preimages
            .then(|| PreimageStore::new(Arc::clone(&diskdb), config.preimage_flush_bytes));

        Ok(Self::with_parts(diskdb, cleans, preimages))
    }

    /// Assemble a database from explicit collaborators.
    pub fn with_parts(
        diskdb: Arc<dyn KeyValueStore>,
        cleans: Option<Arc<dyn CleanCache>>,
        preimages: Option<PreimageStore>,
    ) -> Self {
        Self {
            diskdb,
            dirties: RwLock::new(WriteBuffer::new()),
            epoch: AtomicU64::new(0),
            cleans,
            preimages,
            meters: CacheMeters::new(),
        }
    }

    /// Buffer a write under an already namespaced key.
    pub(crate) fn put_dirty(&self, key: &[u8], value: &[u8]) {
        self.dirties.write().put(key, value);
    }

    /// Tiered read of an already namespaced key: buffer, clean cache, disk.
    pub(crate) fn get_tiered(&self, key: &[u8]) -> TrieDbResult<Vec<u8>> {
        // Scoped so the shared lock is released before cache and disk.
        let epoch = {
            let dirties = self.dirties.read();
            if let Some(value) = dirties.get(key) {
                return Ok(value.to_vec());
            }
            self.epoch.load(Ordering::Acquire)
        };

        if let Some(cleans) = &self.cleans {
            if let Some(enc) = cleans.get(key) {
                self.meters.mark_hit(enc.len());
                return Ok(enc);
            }
        }

        let value = self.diskdb.get(key)?.ok_or(TrieDbError::KeyNotFound)?;
        if let Some(cleans) = &self.cleans {
            // A commit since the buffer check may have overwritten `value` on
            // disk after it was read; only cache it if none did.
            let _dirties = self.dirties.read();
            if self.epoch.load(Ordering::Acquire) == epoch {
                cleans.set(key, &value);
                self.meters.mark_miss(value.len());
            }
        }
        Ok(value)
    }

    /// Move every buffered write to disk in one batch and flush preimages.
    ///
    /// Cached copies of the committed keys are dropped; the cache is only
    /// ever filled by disk reads. If the disk write fails the buffer is kept
    /// as it was.
    pub fn commit(&self) -> TrieDbResult<CommitStats> {
        let start = Instant::now();
        let mut stats = CommitStats::default();

        {
            // Held for the whole write so no Put slips in between copy and clear.
            let mut dirties = self.dirties.write();
            if !dirties.is_empty() {
                let batch = dirties.to_batch();
                stats.nodes = batch.len();
                stats.bytes = dirties.size();
                self.diskdb.write(batch)?;
                self.epoch.fetch_add(1, Ordering::AcqRel);
                self.invalidate_cached(&dirties);
                dirties.clear();
            }
        }

        if let Some(preimages) = &self.preimages {
            stats.preimages = preimages.commit(true)?;
        }

        info!(
            "Persisted trie from memory database: nodes={} size={} preimages={} elapsed={:?}",
            stats.nodes,
            stats.bytes,
            stats.preimages,
            start.elapsed()
        );
        Ok(stats)
    }

    /// Drop cached copies of keys that were just overwritten on disk.
    fn invalidate_cached(&self, committed: &WriteBuffer) {
        if let Some(cleans) = &self.cleans {
            for key in committed.keys() {
                cleans.remove(key);
            }
        }
    }

    /// Buffer preimages and flush them once the configured threshold is
    /// reached.
    ///
    /// A failed flush is logged and the preimages stay buffered for the next
    /// attempt. No-op without a preimage store.
    pub fn record_preimages(&self, preimages: HashMap<Hash, Vec<u8>>) {
        let Some(store) = &self.preimages else {
            return;
        };
        store.insert_preimage(preimages);
        if let Err(e) = store.commit(false) {
            warn!("Failed to flush preimages, keeping {} buffered: {}", store.len(), e);
        }
    }

    /// Buffered writes not yet committed.
    pub fn dirty_len(&self) -> usize {
        self.dirties.read().len()
    }

    /// Key plus value bytes buffered.
    pub fn dirty_size(&self) -> usize {
        self.dirties.read().size()
    }

    /// Whether `key` (namespaced) is in the write buffer.
    pub fn is_dirty(&self, key: &[u8]) -> bool {
        self.dirties.read().contains(key)
    }

    /// The shared disk handle.
    pub fn disk(&self) -> &Arc<dyn KeyValueStore> {
        &self.diskdb
    }

    pub fn clean_cache(&self) -> Option<&Arc<dyn CleanCache>> {
        self.cleans.as_ref()
    }

    pub fn preimages(&self) -> Option<&PreimageStore> {
        self.preimages.as_ref()
    }

    /// Snapshot of the clean cache meters.
    pub fn cache_stats(&self) -> CacheStats {
        self.meters.snapshot()
    }
}

impl std::fmt::Debug for TrieDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrieDatabase")
            .field("dirties", &self.dirty_len())
            .field("dirty_size", &self.dirty_size())
            .field("clean_cache", &self.cleans.is_some())
            .field("preimages", &self.preimages.is_some())
            .finish()
    }
}
