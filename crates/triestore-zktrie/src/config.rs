//! Trie database configuration
//!
//! The zk-trie default runs without a clean cache and without preimage
//! recording; both are opt-in.

/// Flush preimages to disk once this many bytes are buffered.
pub const DEFAULT_PREIMAGE_FLUSH_BYTES: usize = 4 * 1024 * 1024;

/// Trie database configuration
#[derive(Debug, Clone)]
pub struct TrieDbConfig {
    /// Clean cache budget in bytes (keys + values); 0 disables the cache
    pub clean_cache_bytes: usize,
    /// Record preimages of hashed keys
    pub preimages: bool,
    /// Buffered preimage bytes that trigger a flush on commit
    pub preimage_flush_bytes: usize,
}

impl TrieDbConfig {
    /// Enable a clean cache of `bytes` total size.
    pub fn with_clean_cache(mut self, bytes: usize) -> Self {
        self.clean_cache_bytes = bytes;
        self
    }

    /// Enable preimage recording.
    pub fn with_preimages(mut self) -> Self {
        self.preimages = true;
        self
    }

    /// Flush buffered preimages once they reach `bytes`.
    pub fn with_preimage_flush_bytes(mut self, bytes: usize) -> Self {
        self.preimage_flush_bytes = bytes;
        self
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.preimages && self.preimage_flush_bytes == 0 {
            return Err("preimage_flush_bytes must be > 0 when preimages are enabled".into());
        }
        Ok(())
    }
}

impl Default for TrieDbConfig {
    fn default() -> Self {
        Self {
            clean_cache_bytes: 0,
            preimages: false,
            preimage_flush_bytes: DEFAULT_PREIMAGE_FLUSH_BYTES,
        }
    }
}
