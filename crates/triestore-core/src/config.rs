//! Configuration for the journal-backed engine
//!
//! Two presets cover the common cases: `durable()` syncs every write to
//! the journal, `bulk()` leaves syncing to explicit `sync()`/`close()` calls
//! and batch commits.

/// Engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Journal segment rotation threshold (bytes)
    pub journal_rotation_bytes: u64,
    /// Maximum key size in bytes
    pub max_key_size: usize,
    /// Maximum value size in bytes
    pub max_value_size: usize,
    /// Durably sync the journal after every put, delete and batch
    pub sync_writes: bool,
}

impl Config {
    /// Every acknowledged write survives power loss.
    pub fn durable() -> Self {
        Self {
            journal_rotation_bytes: 64 * 1024 * 1024,
            max_key_size: 1024,
            max_value_size: 16 * 1024 * 1024,
            sync_writes: true,
        }
    }

    /// Trie commits: many small writes, one sync per batch.
    pub fn bulk() -> Self {
        Self {
            journal_rotation_bytes: 256 * 1024 * 1024,
            max_key_size: 1024,
            max_value_size: 16 * 1024 * 1024,
            sync_writes: false,
        }
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.journal_rotation_bytes < 64 * 1024 {
            return Err("journal_rotation_bytes must be >= 64KB".into());
        }
        if self.max_key_size == 0 || self.max_key_size > u16::MAX as usize {
            return Err("max_key_size must be in [1, 65535]".into());
        }
        if self.max_value_size == 0 || self.max_value_size > 128 * 1024 * 1024 {
            return Err("max_value_size must be in [1, 128MB]".into());
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self { Self::durable() }
}
