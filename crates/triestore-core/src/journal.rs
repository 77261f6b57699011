//! Append-only journal: the durable half of the engine.
//!
//! The journal is a directory of segments named `journal-{seq:016x}.log`.
//! Writes are appended to the highest segment; once it would grow past the
//! rotation threshold a new segment is started. Replay reads segments in
//! sequence order and applies every intact frame.
//!
//! The write path is journal-first: the engine only touches its in-memory
//! map after `append` has returned.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::format::{payload_len, Record, HEADER_SIZE, MAGIC};
use crate::sync::{sync_dir, sync_file};

const SEGMENT_PREFIX: &str = "journal-";
const SEGMENT_SUFFIX: &str = ".log";
const COMPACT_SUFFIX: &str = ".compact";

fn segment_path(dir: &Path, sequence: u64) -> PathBuf {
    dir.join(format!("{}{:016x}{}", SEGMENT_PREFIX, sequence, SEGMENT_SUFFIX))
}

fn parse_segment_name(name: &str) -> Option<u64> {
    let hex = name.strip_prefix(SEGMENT_PREFIX)?.strip_suffix(SEGMENT_SUFFIX)?;
    u64::from_str_radix(hex, 16).ok()
}

/// All segments in `dir`, sorted by sequence number.
fn list_segments(dir: &Path) -> StoreResult<Vec<(u64, PathBuf)>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| StoreError::io(dir, e, "Failed to read journal directory"))?;

    let mut segments = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io(dir, e, "Failed to read directory entry"))?;
        let name = entry.file_name();
        if let Some(sequence) = name.to_str().and_then(parse_segment_name) {
            segments.push((sequence, entry.path()));
        }
    }
    segments.sort_by_key(|(sequence, _)| *sequence);
    Ok(segments)
}

/// Outcome of a journal compaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionStats {
    /// Segments replaced by the compacted one
    pub segments_removed: usize,
    /// Live entries written to the compacted segment
    pub live_entries: usize,
    /// Journal bytes before compaction
    pub bytes_before: u64,
    /// Journal bytes after compaction
    pub bytes_after: u64,
}

/// Appends frames to the active segment.
pub struct JournalWriter {
    file: File,
    path: PathBuf,
    dir: PathBuf,
    size: u64,
    sequence: u64,
    rotation_bytes: u64,
}

impl JournalWriter {
    /// Open the highest existing segment for appending, or create segment 0.
    ///
    /// Leftover `.compact` files from an interrupted compaction are removed.
    pub fn open<P: AsRef<Path>>(dir: P, rotation_bytes: u64) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|e| StoreError::io(&dir, e, "Failed to create journal directory"))?;

        remove_stale_compactions(&dir)?;

        let sequence = list_segments(&dir)?
            .last()
            .map(|(sequence, _)| *sequence)
            .unwrap_or(0);
        let path = segment_path(&dir, sequence);
        let file = open_append(&path)?;
        let size = file
            .metadata()
            .map_err(|e| StoreError::io(&path, e, "Failed to stat journal segment"))?
            .len();

        Ok(Self { file, path, dir, size, sequence, rotation_bytes })
    }

    /// Append records as one contiguous write. Does not sync.
    pub fn append(&mut self, records: &[Record]) -> StoreResult<()> {
        let total: usize = records.iter().map(Record::frame_len).sum();
        if total == 0 {
            return Ok(());
        }

        if self.size > 0 && self.size + total as u64 > self.rotation_bytes {
            self.rotate()?;
        }

        let mut buf = Vec::with_capacity(total);
        for record in records {
            record.encode_into(&mut buf);
        }

        self.file
            .write_all(&buf)
            .map_err(|e| StoreError::io(&self.path, e, "Journal write failed"))?;
        self.size += buf.len() as u64;
        Ok(())
    }

    /// Durably sync the active segment.
    pub fn sync(&self) -> StoreResult<()> {
        sync_file(&self.file).map_err(|e| StoreError::io(&self.path, e, "Journal sync failed"))
    }

    fn rotate(&mut self) -> StoreResult<()> {
        self.sync()?;
        self.sequence += 1;
        self.path = segment_path(&self.dir, self.sequence);
        self.file = open_append(&self.path)?;
        self.size = 0;
        debug!("Journal rotated to {}", self.path.display());
        Ok(())
    }

    /// Replace every segment with a single one holding `live` entries.
    ///
    /// The new segment is written under a temporary name, synced, then
    /// renamed into place before the old segments are unlinked. A crash at
    /// any step leaves a journal that replays to the same state.
    pub fn compact<'a, I>(&mut self, live: I) -> StoreResult<CompactionStats>
    where
        I: IntoIterator<Item = (&'a [u8], &'a [u8])>,
    {
        self.sync()?;
        let old_segments = list_segments(&self.dir)?;
        let mut bytes_before = 0u64;
        for (_, path) in &old_segments {
            bytes_before += fs::metadata(path)
                .map_err(|e| StoreError::io(path, e, "Failed to stat journal segment"))?
                .len();
        }

        let sequence = self.sequence + 1;
        let final_path = segment_path(&self.dir, sequence);
        let tmp_path = final_path.with_extension(format!("log{}", COMPACT_SUFFIX));

        let mut buf = Vec::new();
        let mut live_entries = 0usize;
        for (key, value) in live {
            Record::put(key, value).encode_into(&mut buf);
            live_entries += 1;
        }

        {
            let mut tmp = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)
                .map_err(|e| StoreError::io(&tmp_path, e, "Failed to create compacted segment"))?;
            tmp.write_all(&buf)
                .map_err(|e| StoreError::io(&tmp_path, e, "Compacted segment write failed"))?;
            sync_file(&tmp)
                .map_err(|e| StoreError::io(&tmp_path, e, "Compacted segment sync failed"))?;
        }

        fs::rename(&tmp_path, &final_path)
            .map_err(|e| StoreError::io(&final_path, e, "Failed to install compacted segment"))?;
        sync_dir(&self.dir).map_err(|e| StoreError::io(&self.dir, e, "Journal directory sync failed"))?;

        for (_, path) in &old_segments {
            fs::remove_file(path)
                .map_err(|e| StoreError::io(path, e, "Failed to remove compacted segment"))?;
        }
        sync_dir(&self.dir).map_err(|e| StoreError::io(&self.dir, e, "Journal directory sync failed"))?;

        self.sequence = sequence;
        self.file = open_append(&final_path)?;
        self.path = final_path;
        self.size = buf.len() as u64;

        Ok(CompactionStats {
            segments_removed: old_segments.len(),
            live_entries,
            bytes_before,
            bytes_after: self.size,
        })
    }

    /// Path of the active segment
    pub fn current_path(&self) -> &Path {
        &self.path
    }

    /// Bytes in the active segment
    pub fn current_size(&self) -> u64 {
        self.size
    }

    /// Sequence number of the active segment
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

fn open_append(path: &Path) -> StoreResult<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StoreError::io(path, e, "Failed to open journal segment"))
}

fn remove_stale_compactions(dir: &Path) -> StoreResult<()> {
    let entries = fs::read_dir(dir)
        .map_err(|e| StoreError::io(dir, e, "Failed to read journal directory"))?;
    for entry in entries.flatten() {
        let is_stale = entry
            .file_name()
            .to_str()
            .map_or(false, |name| name.starts_with(SEGMENT_PREFIX) && name.ends_with(COMPACT_SUFFIX));
        if is_stale {
            let path = entry.path();
            warn!("Removing interrupted compaction output {}", path.display());
            fs::remove_file(&path)
                .map_err(|e| StoreError::io(&path, e, "Failed to remove stale compaction"))?;
        }
    }
    Ok(())
}

/// Counters from one replay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub segments: usize,
    pub records: usize,
    /// Frames dropped for bad magic, checksum or structure
    pub skipped: usize,
    /// Segments whose tail held an incomplete frame
    pub torn_tails: usize,
}

/// Reads segments back in order.
pub struct JournalReader {
    dir: PathBuf,
}

impl JournalReader {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    /// Feed every intact record to `apply`, oldest first.
    ///
    /// Per segment: a frame with bad magic or a failed checksum is skipped
    /// and reading resumes at the next magic; a frame running past the end
    /// of the segment is the crash point and ends that segment.
    pub fn replay<F>(&self, mut apply: F) -> StoreResult<ReplayStats>
    where
        F: FnMut(Record),
    {
        let mut stats = ReplayStats::default();
        if !self.dir.exists() {
            return Ok(stats);
        }

        for (_, path) in list_segments(&self.dir)? {
            let mut buf = Vec::new();
            File::open(&path)
                .and_then(|mut file| file.read_to_end(&mut buf))
                .map_err(|e| StoreError::io(&path, e, "Failed to read journal segment"))?;

            replay_segment(&path, &buf, &mut apply, &mut stats);
            stats.segments += 1;
        }

        if stats.records > 0 {
            info!(
                "Replayed {} journal records from {} segments in {}",
                stats.records,
                stats.segments,
                self.dir.display()
            );
        }
        Ok(stats)
    }
}

fn replay_segment<F>(path: &Path, buf: &[u8], apply: &mut F, stats: &mut ReplayStats)
where
    F: FnMut(Record),
{
    let mut offset = 0usize;

    while offset < buf.len() {
        if buf.len() - offset < HEADER_SIZE {
            warn!("Torn header in {} at offset {}", path.display(), offset);
            stats.torn_tails += 1;
            return;
        }

        if buf[offset..offset + 4] != MAGIC {
            warn!("Bad magic in {} at offset {}, resyncing", path.display(), offset);
            stats.skipped += 1;
            match find_next_magic(buf, offset + 1) {
                Some(next) => {
                    offset = next;
                    continue;
                }
                None => return,
            }
        }

        let frame_end = offset + HEADER_SIZE + payload_len(&buf[offset..]) as usize;
        if frame_end > buf.len() {
            warn!(
                "Torn write in {} at offset {}: frame needs {} bytes, {} remain",
                path.display(),
                offset,
                frame_end - offset,
                buf.len() - offset
            );
            stats.torn_tails += 1;
            return;
        }

        match Record::decode(&buf[offset..frame_end], path, offset as u64) {
            Ok(record) => {
                apply(record);
                stats.records += 1;
                offset = frame_end;
            }
            Err(e) => {
                warn!("Skipping corrupt journal frame: {}", e);
                stats.skipped += 1;
                match find_next_magic(buf, offset + 1) {
                    Some(next) => offset = next,
                    None => return,
                }
            }
        }
    }
}

fn find_next_magic(buf: &[u8], start: usize) -> Option<usize> {
    buf.get(start..)?
        .windows(MAGIC.len())
        .position(|window| window == MAGIC)
        .map(|pos| start + pos)
}
