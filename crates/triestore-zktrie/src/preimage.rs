//! Preimage recording: hash → original bytes.
//!
//! Preimages let a trie key hash be traced back to the key it came from.
//! They are buffered in memory and persisted on commit under
//! `secure-key-` ‖ hash. The trie's node read path never consults them.

use std::sync::Arc;

use hashbrown::HashMap;
use log::debug;
use parking_lot::RwLock;

use triestore_core::{KeyValueStore, WriteBatch};

use crate::error::TrieDbResult;
use crate::hash::{Hash, HASH_LENGTH};

/// Disk key prefix for persisted preimages.
pub const PREIMAGE_PREFIX: &[u8] = b"secure-key-";

/// Disk key holding the preimage of `hash`.
pub fn preimage_key(hash: &Hash) -> Vec<u8> {
    let mut key = Vec::with_capacity(PREIMAGE_PREFIX.len() + HASH_LENGTH);
    key.extend_from_slice(PREIMAGE_PREFIX);
    key.extend_from_slice(hash.as_ref());
    key
}

#[derive(Default)]
struct Pending {
    preimages: HashMap<Hash, Vec<u8>>,
    /// Hash plus preimage bytes buffered
    size: usize,
}

/// Buffered preimage table backed by the disk store.
pub struct PreimageStore {
    disk: Arc<dyn KeyValueStore>,
    pending: RwLock<Pending>,
    flush_bytes: usize,
}

impl PreimageStore {
    pub fn new(disk: Arc<dyn KeyValueStore>, flush_bytes: usize) -> Self {
        Self { disk, pending: RwLock::new(Pending::default()), flush_bytes }
    }

    /// Buffer every entry of `preimages`. A later entry for the same hash
    /// replaces the earlier one.
    pub fn insert_preimage(&self, preimages: HashMap<Hash, Vec<u8>>) {
        let mut pending = self.pending.write();
        for (hash, preimage) in preimages {
            let added = preimage.len();
            match pending.preimages.insert(hash, preimage) {
                Some(old) => pending.size = pending.size - old.len() + added,
                None => pending.size += HASH_LENGTH + added,
            }
        }
    }

    /// Preimage of `hash`, from the buffer first and then from disk.
    pub fn preimage(&self, hash: &Hash) -> TrieDbResult<Option<Vec<u8>>> {
        if let Some(preimage) = self.pending.read().preimages.get(hash) {
            return Ok(Some(preimage.clone()));
        }
        Ok(self.disk.get(&preimage_key(hash))?)
    }

    /// Buffered bytes not yet on disk.
    pub fn size(&self) -> usize {
        self.pending.read().size
    }

    /// Buffered preimages not yet on disk.
    pub fn len(&self) -> usize {
        self.pending.read().preimages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.read().preimages.is_empty()
    }

    /// Persist the buffer if it reached the flush threshold, or always when
    /// `force` is set. Returns the number of preimages written.
    ///
    /// On a disk failure the buffer is kept intact.
    pub fn commit(&self, force: bool) -> TrieDbResult<usize> {
        let mut pending = self.pending.write();
        if pending.preimages.is_empty() || (!force && pending.size < self.flush_bytes) {
            return Ok(0);
        }

        let mut batch = WriteBatch::new();
        for (hash, preimage) in pending.preimages.iter() {
            batch.put(&preimage_key(hash), preimage);
        }
        self.disk.write(batch)?;

        let written = pending.preimages.len();
        debug!("Flushed {} preimages ({} bytes)", written, pending.size);
        pending.preimages.clear();
        pending.size = 0;
        Ok(written)
    }
}

impl std::fmt::Debug for PreimageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending = self.pending.read();
        f.debug_struct("PreimageStore")
            .field("pending", &pending.preimages.len())
            .field("size", &pending.size)
            .field("flush_bytes", &self.flush_bytes)
            .finish()
    }
}
