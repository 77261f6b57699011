//! Clean cache meters.
//!
//! Monitoring output only; nothing in the read path depends on them.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of the clean cache meters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads served by the clean cache
    pub clean_hits: u64,
    /// Bytes served by the clean cache
    pub clean_hit_bytes: u64,
    /// Disk reads that then populated the clean cache
    pub clean_misses: u64,
    /// Bytes written into the clean cache
    pub clean_write_bytes: u64,
}

impl CacheStats {
    /// Share of cache lookups that hit, in `[0.0, 1.0]`.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.clean_hits + self.clean_misses;
        if total == 0 {
            0.0
        } else {
            self.clean_hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub struct CacheMeters {
    hits: AtomicU64,
    hit_bytes: AtomicU64,
    misses: AtomicU64,
    write_bytes: AtomicU64,
}

impl CacheMeters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_hit(&self, bytes: usize) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.hit_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn mark_miss(&self, bytes: usize) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.write_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            clean_hits: self.hits.load(Ordering::Relaxed),
            clean_hit_bytes: self.hit_bytes.load(Ordering::Relaxed),
            clean_misses: self.misses.load(Ordering::Relaxed),
            clean_write_bytes: self.write_bytes.load(Ordering::Relaxed),
        }
    }
}
