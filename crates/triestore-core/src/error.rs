//! Error types for triestore engine operations
//!
//! Every engine failure is a [`StoreError`]. The enum is `Clone` so that
//! cursors can hand out their residual error more than once.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Engine error types with detailed context
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// I/O operation failed
    #[error("I/O error{}: {message} ({kind})", display_path(.path))]
    Io {
        /// The file path where the error occurred
        path: Option<PathBuf>,
        /// The underlying I/O error kind
        kind: std::io::ErrorKind,
        /// Human-readable description
        message: String,
    },

    /// A journal frame could not be parsed
    #[error("journal corrupted in {} at offset {offset}: {reason}", .path.display())]
    JournalCorrupted {
        /// Journal segment containing the frame
        path: PathBuf,
        /// Byte offset of the frame
        offset: u64,
        /// Description of the corruption
        reason: String,
    },

    /// CRC32C of a frame payload did not match its header
    #[error(
        "checksum mismatch in {} at offset {offset}: expected 0x{expected:08x}, got 0x{actual:08x}",
        .path.display()
    )]
    ChecksumMismatch {
        /// Journal segment containing the frame
        path: PathBuf,
        /// Checksum stored in the header
        expected: u32,
        /// Checksum computed over the payload
        actual: u32,
        /// Byte offset of the frame
        offset: u64,
    },

    /// Frame is cut short (a write interrupted by a crash)
    #[error(
        "torn write in {} at offset {offset}: expected {expected_size} bytes, only {available_bytes} available",
        .path.display()
    )]
    TornWrite {
        /// Journal segment with the torn frame
        path: PathBuf,
        /// Payload length announced by the header
        expected_size: u32,
        /// Payload bytes actually present
        available_bytes: u64,
        /// Byte offset of the payload
        offset: u64,
    },

    /// Magic bytes not found where a frame should start
    #[error(
        "magic bytes not found in {} at offset {offset}: found {:02x}{:02x}{:02x}{:02x}",
        .path.display(), .found_bytes[0], .found_bytes[1], .found_bytes[2], .found_bytes[3]
    )]
    NoMagicFound {
        /// Journal segment being read
        path: PathBuf,
        /// Offset where magic was expected
        offset: u64,
        /// Bytes actually found
        found_bytes: [u8; 4],
    },

    /// Key or value exceeds the configured maximum
    #[error("entry {component} too large: {entry_size} bytes exceeds limit of {max_size} bytes")]
    OversizedEntry {
        /// Size of the oversized component
        entry_size: u64,
        /// Maximum allowed size
        max_size: u64,
        /// Either "key" or "value"
        component: &'static str,
    },

    /// Configuration rejected by `Config::validate`
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The store has been closed
    #[error("store is closed")]
    Closed,
}

fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" in {}", path.display()),
        None => String::new(),
    }
}

impl StoreError {
    /// Build an `Io` error carrying the path and a short description.
    pub fn io(path: &Path, err: std::io::Error, what: &str) -> Self {
        StoreError::Io {
            path: Some(path.to_path_buf()),
            kind: err.kind(),
            message: format!("{}: {}", what, err),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io {
            path: None,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for engine operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::ChecksumMismatch {
            path: PathBuf::from("/tmp/journal-0000000000000000.log"),
            expected: 0x12345678,
            actual: 0x87654321,
            offset: 1024,
        };

        let display = err.to_string();
        assert!(display.contains("checksum mismatch"));
        assert!(display.contains("0x12345678"));
        assert!(display.contains("0x87654321"));
    }

    #[test]
    fn test_io_display_with_and_without_path() {
        let with_path = StoreError::io(
            Path::new("/data/journal"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            "Failed to open journal",
        );
        assert!(with_path.to_string().contains("in /data/journal"));

        let without: StoreError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(without.to_string().starts_with("I/O error: gone"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: StoreError = io_err.into();

        match err {
            StoreError::Io { kind, path, .. } => {
                assert_eq!(kind, std::io::ErrorKind::NotFound);
                assert!(path.is_none());
            }
            _ => panic!("Expected Io error"),
        }
    }
}
