//! Namespaced zk-trie storage adaptor.
//!
//! `ZktrieDatabase` is what the trie talks to. It prefixes every key with
//! its namespace and routes reads and writes through the shared
//! [`TrieDatabase`]:
//!
//! - `put` lands in the write buffer and is visible at once
//! - `get` checks buffer, then clean cache, then disk
//! - `iterate`/`list` scan the disk only; buffered writes show up after a
//!   commit
//! - `close` closes the shared disk handle for every adaptor on it

use std::sync::Arc;

use hashbrown::HashMap;
use log::error;
use num_bigint::BigUint;

use triestore_core::{KeyValueStore, KvIterator};

use crate::database::TrieDatabase;
use crate::error::{TrieDbError, TrieDbResult};
use crate::hash::Hash;

/// One entry yielded by [`ZktrieStorage::list`], key without namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kv {
    pub k: Vec<u8>,
    pub v: Vec<u8>,
}

/// The storage surface a zk-trie needs from its backing store.
pub trait ZktrieStorage {
    /// Buffer `value` under `key`. Visible to `get` immediately.
    fn put(&self, key: &[u8], value: &[u8]) -> TrieDbResult<()>;

    /// Latest value of `key`, or `KeyNotFound`.
    fn get(&self, key: &[u8]) -> TrieDbResult<Vec<u8>>;

    /// Visit every persisted entry in key order.
    ///
    /// The visitor returns `Ok(true)` to continue, `Ok(false)` to stop, or
    /// an error, which stops iteration and is returned as is.
    fn iterate<F, E>(&self, visitor: F) -> Result<(), E>
    where
        F: FnMut(&[u8], &[u8]) -> Result<bool, E>,
        E: From<TrieDbError>;

    /// Close the backing store.
    fn close(&self) -> TrieDbResult<()>;

    /// Record that `hash_field` is the hash of `preimage`.
    fn update_preimage(&self, preimage: &[u8], hash_field: &BigUint);

    /// Up to `limit` persisted entries, in key order.
    fn list(&self, limit: usize) -> TrieDbResult<Vec<Kv>> {
        let mut entries = Vec::new();
        self.iterate(|key, value| {
            if entries.len() >= limit {
                return Ok::<bool, TrieDbError>(false);
            }
            entries.push(Kv { k: key.to_vec(), v: value.to_vec() });
            Ok(entries.len() < limit)
        })?;
        Ok(entries)
    }
}

/// Releases its cursor exactly once, on `release` or on drop.
struct CursorGuard {
    cursor: Box<dyn KvIterator>,
    released: bool,
}

impl CursorGuard {
    fn new(cursor: Box<dyn KvIterator>) -> Self {
        Self { cursor, released: false }
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.cursor.release();
        }
    }
}

impl Drop for CursorGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Trie storage adaptor over one namespace of a shared [`TrieDatabase`].
#[derive(Clone)]
pub struct ZktrieDatabase {
    db: Arc<TrieDatabase>,
    prefix: Vec<u8>,
}

impl ZktrieDatabase {
    /// Adaptor over a fresh trie database on `diskdb`: no clean cache, no
    /// preimages, empty prefix.
    pub fn new(diskdb: Arc<dyn KeyValueStore>) -> Self {
        Self::from_triedb(Arc::new(TrieDatabase::with_parts(diskdb, None, None)))
    }

    /// Adaptor spanning the whole of an existing trie database.
    pub fn from_triedb(db: Arc<TrieDatabase>) -> Self {
        Self::with_prefix(db, &[])
    }

    /// Adaptor confined to keys under `prefix`.
    pub fn with_prefix(db: Arc<TrieDatabase>, prefix: &[u8]) -> Self {
        Self { db, prefix: prefix.to_vec() }
    }

    /// `prefix ‖ key`, the key as stored physically.
    pub fn namespaced_key(&self, key: &[u8]) -> Vec<u8> {
        let mut namespaced = Vec::with_capacity(self.prefix.len() + key.len());
        namespaced.extend_from_slice(&self.prefix);
        namespaced.extend_from_slice(key);
        namespaced
    }

    /// Strip this adaptor's prefix length from a physical key.
    ///
    /// Only meaningful for keys produced by this adaptor's own prefix scan.
    fn logical_key<'a>(&self, namespaced: &'a [u8]) -> &'a [u8] {
        &namespaced[self.prefix.len().min(namespaced.len())..]
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// The shared database behind this adaptor.
    pub fn database(&self) -> &Arc<TrieDatabase> {
        &self.db
    }
}

impl ZktrieStorage for ZktrieDatabase {
    fn put(&self, key: &[u8], value: &[u8]) -> TrieDbResult<()> {
        self.db.put_dirty(&self.namespaced_key(key), value);
        Ok(())
    }

    fn get(&self, key: &[u8]) -> TrieDbResult<Vec<u8>> {
        self.db.get_tiered(&self.namespaced_key(key))
    }

    fn iterate<F, E>(&self, mut visitor: F) -> Result<(), E>
    where
        F: FnMut(&[u8], &[u8]) -> Result<bool, E>,
        E: From<TrieDbError>,
    {
        let mut guard = CursorGuard::new(self.db.disk().new_iterator(&self.prefix));
        while guard.cursor.next() {
            let key = self.logical_key(guard.cursor.key());
            if !visitor(key, guard.cursor.value())? {
                break;
            }
        }
        guard.release();

        match guard.cursor.error() {
            Some(e) => Err(TrieDbError::from(e).into()),
            None => Ok(()),
        }
    }

    fn close(&self) -> TrieDbResult<()> {
        self.db.disk().close().map_err(|source| {
            error!("Failed to close trie disk store: {}", source);
            TrieDbError::Close { source }
        })
    }

    fn update_preimage(&self, preimage: &[u8], hash_field: &BigUint) {
        if self.db.preimages().is_some() {
            let mut entry = HashMap::with_capacity(1);
            entry.insert(Hash::from_field(hash_field), preimage.to_vec());
            self.db.record_preimages(entry);
        }
    }
}

impl std::fmt::Debug for ZktrieDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZktrieDatabase")
            .field("prefix", &hex::encode(&self.prefix))
            .field("db", &self.db)
            .finish()
    }
}
