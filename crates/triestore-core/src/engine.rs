//! Journal-backed store engine.
//!
//! StoreEngine keeps its whole working set in an ordered map and makes it
//! durable through the journal.
//!
//! **Read path**: RAM only, under a shared lock
//! **Write path**: journal append (and sync, if configured), then RAM
//! **Open**: journal replay rebuilds RAM

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use log::info;
use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::{StoreError, StoreResult};
use crate::format::{Op, Record};
use crate::journal::{CompactionStats, JournalReader, JournalWriter};
use crate::store::{KeyValueStore, KvIterator, SnapshotIterator, WriteBatch};

/// Ordered RAM map + journal.
///
/// Writers serialize through the journal mutex and only then take the map's
/// write lock, so readers are blocked for the in-memory update alone.
pub struct StoreEngine {
    /// Working set, ordered for prefix iteration
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    /// Journal writer; `None` once closed
    journal: Mutex<Option<JournalWriter>>,
    closed: AtomicBool,
    path: PathBuf,
    config: Config,
}

impl StoreEngine {
    /// Open or create a store at `path`, replaying its journal.
    pub fn open<P: AsRef<Path>>(path: P, config: Config) -> StoreResult<Self> {
        config.validate().map_err(StoreError::InvalidConfig)?;

        let path = path.as_ref().to_path_buf();
        let journal_dir = path.join("journal");

        let mut data = BTreeMap::new();
        let stats = JournalReader::new(&journal_dir).replay(|record| match record.op {
            Op::Put => {
                data.insert(record.key, record.value);
            }
            Op::Delete => {
                data.remove(&record.key);
            }
        })?;

        if stats.records > 0 {
            info!(
                "Recovered {} live entries ({} skipped frames) from {}",
                data.len(),
                stats.skipped,
                journal_dir.display()
            );
        }

        let journal = JournalWriter::open(&journal_dir, config.journal_rotation_bytes)?;

        Ok(Self {
            data: RwLock::new(data),
            journal: Mutex::new(Some(journal)),
            closed: AtomicBool::new(false),
            path,
            config,
        })
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    fn check_sizes(&self, record: &Record) -> StoreResult<()> {
        if record.key.len() > self.config.max_key_size {
            return Err(StoreError::OversizedEntry {
                entry_size: record.key.len() as u64,
                max_size: self.config.max_key_size as u64,
                component: "key",
            });
        }
        if record.value.len() > self.config.max_value_size {
            return Err(StoreError::OversizedEntry {
                entry_size: record.value.len() as u64,
                max_size: self.config.max_value_size as u64,
                component: "value",
            });
        }
        Ok(())
    }

    /// Journal `records`, then apply them to RAM.
    ///
    /// If the journal write fails, RAM is never modified.
    fn commit_records(&self, records: Vec<Record>) -> StoreResult<()> {
        for record in &records {
            self.check_sizes(record)?;
        }

        let mut journal = self.journal.lock();
        let writer = journal.as_mut().ok_or(StoreError::Closed)?;
        writer.append(&records)?;
        if self.config.sync_writes {
            writer.sync()?;
        }

        let mut data = self.data.write();
        for record in records {
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

    /// Durably sync every journal write made so far.
    pub fn sync(&self) -> StoreResult<()> {
        let journal = self.journal.lock();
        journal.as_ref().ok_or(StoreError::Closed)?.sync()
    }

    /// Rewrite the journal so it holds only the live entries.
    pub fn compact(&self) -> StoreResult<CompactionStats> {
        let mut journal = self.journal.lock();
        let writer = journal.as_mut().ok_or(StoreError::Closed)?;
        let data = self.data.read();
        let stats = writer.compact(data.iter().map(|(k, v)| (k.as_slice(), v.as_slice())))?;
        info!(
            "Compacted journal at {}: {} live entries, {} -> {} bytes",
            self.path.display(),
            stats.live_entries,
            stats.bytes_before,
            stats.bytes_after
        );
        Ok(stats)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Count entries whose key starts with `prefix`.
    pub fn prefix_count(&self, prefix: &[u8]) -> usize {
        let data = self.data.read();
        data.range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .count()
    }

    /// Data directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl KeyValueStore for StoreEngine {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.ensure_open()?;
        self.commit_records(vec![Record::put(key, value)])
    }

    fn delete(&self, key: &[u8]) -> StoreResult<()> {
        self.ensure_open()?;
        self.commit_records(vec![Record::delete(key)])
    }

    fn write(&self, batch: WriteBatch) -> StoreResult<()> {
        self.ensure_open()?;
        if batch.is_empty() {
            return Ok(());
        }
        self.commit_records(batch.into_records())
    }

    fn new_iterator(&self, prefix: &[u8]) -> Box<dyn KvIterator> {
        if let Err(e) = self.ensure_open() {
            return Box::new(SnapshotIterator::failed(e));
        }
        Box::new(SnapshotIterator::from_map(&self.data.read(), prefix))
    }

    /// Sync and drop the journal, then release RAM.
    ///
    /// A second call fails with `Closed`.
    fn close(&self) -> StoreResult<()> {
        let mut journal = self.journal.lock();
        let writer = journal.take().ok_or(StoreError::Closed)?;
        self.closed.store(true, Ordering::Release);
        writer.sync()?;
        drop(writer);
        self.data.write().clear();
        info!("Closed store at {}", self.path.display());
        Ok(())
    }
}

impl Drop for StoreEngine {
    fn drop(&mut self) {
        if let Some(writer) = self.journal.get_mut().take() {
            let _ = writer.sync();
        }
    }
}

impl std::fmt::Debug for StoreEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreEngine")
            .field("path", &self.path)
            .field("entries", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
