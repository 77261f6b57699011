//! Triestore zk-trie — tiered node storage for a zk-trie
//!
//! Sits between a zk-trie and a [`triestore_core::KeyValueStore`]. Every
//! read goes through three tiers:
//!
//! - **Write buffer**: nodes written since the last commit
//! - **Clean cache**: an optional byte-bounded LRU of values read from disk
//! - **Disk**: the backing key-value store
//!
//! Several [`ZktrieDatabase`] adaptors can share one [`TrieDatabase`], each
//! confined to its own key prefix. Preimages of hashed keys can be recorded
//! alongside and are persisted on commit.
//!
//! ```no_run
//! use std::sync::Arc;
//! use triestore_core::{Config, StoreEngine};
//! use triestore_zktrie::{TrieDatabase, TrieDbConfig, ZktrieDatabase, ZktrieStorage};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let disk = Arc::new(StoreEngine::open("/tmp/trie", Config::durable())?);
//! let db = Arc::new(TrieDatabase::new(disk, TrieDbConfig::default().with_clean_cache(64 << 20))?);
//!
//! let storage = ZktrieDatabase::with_prefix(Arc::clone(&db), b"storage/");
//! storage.put(b"node", b"encoded")?;
//! db.commit()?;
//! assert_eq!(storage.get(b"node")?, b"encoded".to_vec());
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod hash;
pub mod meters;
pub mod preimage;
pub mod zktrie;

pub use buffer::WriteBuffer;
pub use cache::{CleanCache, LruCleanCache};
pub use config::TrieDbConfig;
pub use database::{CommitStats, TrieDatabase};
pub use error::{TrieDbError, TrieDbResult};
pub use hash::{Hash, HASH_LENGTH};
pub use meters::CacheStats;
pub use preimage::{preimage_key, PreimageStore, PREIMAGE_PREFIX};
pub use zktrie::{Kv, ZktrieDatabase, ZktrieStorage};
