//! Fixed-width hash keys for the preimage table.

use std::fmt;

use num_bigint::BigUint;

/// Length of a hash in bytes.
pub const HASH_LENGTH: usize = 32;

/// A 32-byte hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash([u8; HASH_LENGTH]);

impl Hash {
    pub const fn new(bytes: [u8; HASH_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Right-align `bytes` into a hash: shorter input is left-padded with
    /// zeros, longer input keeps its last 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut out = [0u8; HASH_LENGTH];
        let tail = &bytes[bytes.len().saturating_sub(HASH_LENGTH)..];
        out[HASH_LENGTH - tail.len()..].copy_from_slice(tail);
        Self(out)
    }

    /// Hash of a field element, taken from its big-endian bytes.
    pub fn from_field(field: &BigUint) -> Self {
        Self::from_slice(&field.to_bytes_be())
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
        &self.0
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self)
    }
}
