//! Integration tests: zk-trie adaptors over the journaled disk engine.
//!
//! These exercise the full ZktrieDatabase -> TrieDatabase -> StoreEngine
//! pipeline on a real directory, including reopen after commit.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use num_bigint::BigUint;
use proptest::prelude::*;
use tempfile::TempDir;

use triestore_core::{Config, KeyValueStore, MemoryStore, StoreEngine};
use triestore_zktrie::{
    preimage_key, Hash, Kv, TrieDatabase, TrieDbConfig, TrieDbError, ZktrieDatabase,
    ZktrieStorage,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn open_engine(dir: &TempDir) -> Arc<StoreEngine> {
    Arc::new(StoreEngine::open(dir.path(), Config::durable()).unwrap())
}

fn test_db(dir: &TempDir) -> Arc<TrieDatabase> {
    let config = TrieDbConfig::default().with_clean_cache(1 << 20).with_preimages();
    Arc::new(TrieDatabase::new(open_engine(dir), config).unwrap())
}

// ---------------------------------------------------------------------------
// Read path
// ---------------------------------------------------------------------------

#[test]
fn test_put_get_before_and_after_commit() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);
    let zk = ZktrieDatabase::from_triedb(Arc::clone(&db));

    zk.put(b"a", b"1").unwrap();
    assert_eq!(zk.get(b"a").unwrap(), b"1".to_vec());

    db.commit().unwrap();
    assert_eq!(zk.get(b"a").unwrap(), b"1".to_vec());
    assert_eq!(zk.get(b"a").unwrap(), b"1".to_vec());

    let stats = db.cache_stats();
    assert_eq!(stats.clean_misses, 1);
    assert_eq!(stats.clean_hits, 1);
}

#[test]
fn test_committed_nodes_survive_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let db = test_db(&dir);
        let zk = ZktrieDatabase::with_prefix(Arc::clone(&db), b"P/");
        zk.put(b"x", b"y").unwrap();
        zk.put(b"leaf", b"node").unwrap();
        db.commit().unwrap();
        zk.put(b"uncommitted", b"gone").unwrap();
    }

    let db = test_db(&dir);
    let zk = ZktrieDatabase::with_prefix(Arc::clone(&db), b"P/");
    assert_eq!(zk.get(b"x").unwrap(), b"y".to_vec());
    assert!(zk.get(b"uncommitted").unwrap_err().is_not_found());
    assert_eq!(
        zk.list(10).unwrap(),
        vec![
            Kv { k: b"leaf".to_vec(), v: b"node".to_vec() },
            Kv { k: b"x".to_vec(), v: b"y".to_vec() },
        ]
    );
}

#[test]
fn test_missing_key_on_engine() {
    let dir = TempDir::new().unwrap();
    let zk = ZktrieDatabase::new(open_engine(&dir));
    assert!(matches!(zk.get(b"nothing"), Err(TrieDbError::KeyNotFound)));
}

// ---------------------------------------------------------------------------
// Namespaces
// ---------------------------------------------------------------------------

#[test]
fn test_account_and_storage_tries_share_one_store() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir);
    let db = Arc::new(TrieDatabase::new(engine.clone(), TrieDbConfig::default()).unwrap());

    let accounts = ZktrieDatabase::with_prefix(Arc::clone(&db), b"acct/");
    let storage = ZktrieDatabase::with_prefix(Arc::clone(&db), b"stor/");

    for i in 0..20u8 {
        accounts.put(&[i], &[i, 0xA0]).unwrap();
        storage.put(&[i], &[i, 0x50]).unwrap();
    }
    db.commit().unwrap();

    assert_eq!(engine.prefix_count(b"acct/"), 20);
    assert_eq!(engine.prefix_count(b"stor/"), 20);

    let listed = accounts.list(100).unwrap();
    assert_eq!(listed.len(), 20);
    assert!(listed.iter().all(|kv| kv.v[1] == 0xA0 && kv.k.len() == 1));
    assert_eq!(storage.get(&[7]).unwrap(), vec![7, 0x50]);
}

#[test]
fn test_concurrent_writers_on_separate_namespaces() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);

    let handles: Vec<_> = (0..4u8)
        .map(|t| {
            let zk = ZktrieDatabase::with_prefix(Arc::clone(&db), &[b'T', t]);
            thread::spawn(move || {
                for i in 0..100u32 {
                    let key = i.to_be_bytes();
                    zk.put(&key, &[t]).unwrap();
                    assert_eq!(zk.get(&key).unwrap(), vec![t]);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(db.dirty_len(), 400);
    assert_eq!(db.commit().unwrap().nodes, 400);
    let zk = ZktrieDatabase::with_prefix(Arc::clone(&db), &[b'T', 2]);
    assert_eq!(zk.list(1000).unwrap().len(), 100);
}

// ---------------------------------------------------------------------------
// Iteration, preimages, close
// ---------------------------------------------------------------------------

#[test]
fn test_list_is_ordered_and_bounded() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);
    let zk = ZktrieDatabase::from_triedb(Arc::clone(&db));

    let unordered: [&[u8]; 4] = [b"c", b"a", b"b", b"d"];
    for key in unordered {
        zk.put(key, b"v").unwrap();
    }
    db.commit().unwrap();

    let keys: Vec<Vec<u8>> = zk.list(3).unwrap().into_iter().map(|kv| kv.k).collect();
    assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    assert!(zk.list(0).unwrap().is_empty());
}

#[test]
fn test_preimages_persist_on_commit() {
    let dir = TempDir::new().unwrap();
    let field = BigUint::parse_bytes(b"1234567890abcdef1234567890abcdef", 16).unwrap();
    {
        let db = test_db(&dir);
        let zk = ZktrieDatabase::from_triedb(Arc::clone(&db));
        zk.update_preimage(b"account-0x01", &field);
        assert_eq!(db.commit().unwrap().preimages, 1);
    }

    let engine = open_engine(&dir);
    let stored = engine.get(&preimage_key(&Hash::from_field(&field))).unwrap();
    assert_eq!(stored, Some(b"account-0x01".to_vec()));
}

#[test]
fn test_close_then_everything_fails() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir);
    let zk = ZktrieDatabase::new(engine.clone());

    zk.close().unwrap();
    assert!(engine.is_closed());
    assert!(matches!(zk.close(), Err(TrieDbError::Close { .. })));
    assert!(matches!(zk.get(b"k"), Err(TrieDbError::Store(_))));
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

fn small_bytes() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..8)
}

proptest! {
    #[test]
    fn prop_get_returns_latest_put(
        ops in prop::collection::vec((small_bytes(), small_bytes(), any::<bool>()), 1..64)
    ) {
        let db = Arc::new(TrieDatabase::new(
            Arc::new(MemoryStore::new()),
            TrieDbConfig::default().with_clean_cache(256),
        ).unwrap());
        let zk = ZktrieDatabase::with_prefix(Arc::clone(&db), b"ns");
        let mut model = BTreeMap::new();

        for (key, value, commit) in ops {
            zk.put(&key, &value).unwrap();
            model.insert(key, value);
            if commit {
                db.commit().unwrap();
            }
            for (k, v) in &model {
                prop_assert_eq!(&zk.get(k).unwrap(), v);
            }
        }
    }

    #[test]
    fn prop_namespaces_never_leak(
        left in prop::collection::btree_map(small_bytes(), small_bytes(), 0..16),
        right_keys in prop::collection::btree_set(small_bytes(), 0..16),
    ) {
        let db = Arc::new(TrieDatabase::with_parts(Arc::new(MemoryStore::new()), None, None));
        let a = ZktrieDatabase::with_prefix(Arc::clone(&db), b"A:");
        let b = ZktrieDatabase::with_prefix(Arc::clone(&db), b"B:");

        for (k, v) in &left {
            a.put(k, v).unwrap();
        }
        db.commit().unwrap();

        for k in &right_keys {
            prop_assert!(b.get(k).unwrap_err().is_not_found());
        }
        prop_assert!(b.list(usize::MAX).unwrap().is_empty());

        let listed: BTreeMap<Vec<u8>, Vec<u8>> =
            a.list(usize::MAX).unwrap().into_iter().map(|kv| (kv.k, kv.v)).collect();
        prop_assert_eq!(listed, left);
    }

    #[test]
    fn prop_list_length_is_min_of_limit_and_entries(entries in 0usize..32, limit in 0usize..40) {
        let disk = Arc::new(MemoryStore::new());
        for i in 0..entries as u32 {
            disk.put(&i.to_be_bytes(), b"v").unwrap();
        }
        let zk = ZktrieDatabase::new(disk);
        prop_assert_eq!(zk.list(limit).unwrap().len(), entries.min(limit));
    }
}
