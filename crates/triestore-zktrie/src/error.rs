//! Errors surfaced to the trie layer.
//!
//! The trie treats `KeyNotFound` as "node absent" and anything else as a
//! failed operation.

use thiserror::Error;

use triestore_core::StoreError;

/// Trie database errors
#[derive(Debug, Clone, Error)]
pub enum TrieDbError {
    /// The key has no value in the write buffer, clean cache or disk
    #[error("key not found")]
    KeyNotFound,

    /// The disk store failed; passed through unchanged
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The shared disk handle could not be closed
    #[error("failed to close disk store: {source}")]
    Close {
        /// Failure reported by the disk store
        source: StoreError,
    },

    /// Configuration rejected by `TrieDbConfig::validate`
    #[error("invalid trie database configuration: {0}")]
    InvalidConfig(String),
}

impl TrieDbError {
    /// Whether this is the "absent key" signal rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TrieDbError::KeyNotFound)
    }
}

/// Result type alias for trie database operations
pub type TrieDbResult<T> = Result<T, TrieDbError>;
