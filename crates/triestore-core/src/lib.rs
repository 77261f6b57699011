//! Triestore Core — ordered RAM-first key-value engine
//!
//! The disk tier underneath the zk-trie database. Keys are kept in an ordered
//! map so a table or namespace can be scanned by prefix; durability comes from
//! a checksummed, append-only journal.
//!
//! # Architecture
//!
//! - **Read path**: served from the in-memory `BTreeMap` under a shared lock
//! - **Write path**: journal first, then RAM
//! - **Recovery**: journal replay on open, skipping corrupt frames
//! - **Maintenance**: `compact()` collapses the journal to the live entries
//!
//! Engines implement [`KeyValueStore`]; [`MemoryStore`] is a volatile
//! implementation with the same contract.

pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod journal;
pub mod memory;
pub mod store;
pub mod sync;

pub use config::Config;
pub use engine::StoreEngine;
pub use error::{StoreError, StoreResult};
pub use journal::{CompactionStats, ReplayStats};
pub use memory::MemoryStore;
pub use store::{KeyValueStore, KvIterator, SnapshotIterator, WriteBatch};
