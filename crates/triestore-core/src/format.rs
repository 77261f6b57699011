//! Journal frame format
//!
//! Every journal record is one frame:
//!
//! ```text
//! header (16 bytes)
//!   [0..4]   magic     "ZTKV"
//!   [4..8]   length    u32 LE, payload bytes after the header
//!   [8..12]  checksum  u32 LE, CRC32C of the payload
//!   [12]     op        1 = put, 2 = delete
//!   [13..16] reserved  zero
//! payload
//!   key_len  u32 LE
//!   key      key_len bytes
//!   value    remaining bytes
//! ```

use std::path::Path;

use crate::error::{StoreError, StoreResult};

/// Magic bytes that open every frame.
pub const MAGIC: [u8; 4] = *b"ZTKV";

/// Header size in bytes.
pub const HEADER_SIZE: usize = 16;

const KEY_LEN_SIZE: usize = 4;

/// Journal operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Op {
    /// Insert or overwrite a key
    Put = 1,
    /// Remove a key
    Delete = 2,
}

impl Op {
    fn from_byte(byte: u8) -> Option<Op> {
        match byte {
            1 => Some(Op::Put),
            2 => Some(Op::Delete),
            _ => None,
        }
    }
}

/// One decoded journal record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub op: Op,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Record {
    pub fn put(key: &[u8], value: &[u8]) -> Self {
        Self { op: Op::Put, key: key.to_vec(), value: value.to_vec() }
    }

    pub fn delete(key: &[u8]) -> Self {
        Self { op: Op::Delete, key: key.to_vec(), value: Vec::new() }
    }

    /// Size of the encoded frame, header included.
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + KEY_LEN_SIZE + self.key.len() + self.value.len()
    }

    /// Append the encoded frame to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        let payload_len = KEY_LEN_SIZE + self.key.len() + self.value.len();
        let start = buf.len();
        buf.reserve(HEADER_SIZE + payload_len);

        // Header with a zero checksum, patched once the payload is in place.
        buf.extend_from_slice(&MAGIC);
        buf.extend_from_slice(&(payload_len as u32).to_le_bytes());
        buf.extend_from_slice(&[0u8; 4]);
        buf.push(self.op as u8);
        buf.extend_from_slice(&[0u8; 3]);

        let payload_start = buf.len();
        buf.extend_from_slice(&(self.key.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.key);
        buf.extend_from_slice(&self.value);

        let checksum = crc32c::crc32c(&buf[payload_start..]);
        buf[start + 8..start + 12].copy_from_slice(&checksum.to_le_bytes());
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.frame_len());
        self.encode_into(&mut buf);
        buf
    }

    /// Decode the frame at the start of `data`.
    ///
    /// `origin` and `offset` only feed error context.
    pub fn decode(data: &[u8], origin: &Path, offset: u64) -> StoreResult<Record> {
        if data.len() < HEADER_SIZE {
            return Err(StoreError::TornWrite {
                path: origin.to_path_buf(),
                expected_size: HEADER_SIZE as u32,
                available_bytes: data.len() as u64,
                offset,
            });
        }

        if data[0..4] != MAGIC {
            return Err(StoreError::NoMagicFound {
                path: origin.to_path_buf(),
                offset,
                found_bytes: [data[0], data[1], data[2], data[3]],
            });
        }

        let length = payload_len(data);
        let expected = read_u32(&data[8..12]);
        let payload_offset = offset + HEADER_SIZE as u64;
        let payload = match data.get(HEADER_SIZE..HEADER_SIZE + length as usize) {
            Some(payload) => payload,
            None => {
                return Err(StoreError::TornWrite {
                    path: origin.to_path_buf(),
                    expected_size: length,
                    available_bytes: (data.len() - HEADER_SIZE) as u64,
                    offset: payload_offset,
                })
            }
        };

        let actual = crc32c::crc32c(payload);
        if actual != expected {
            return Err(StoreError::ChecksumMismatch {
                path: origin.to_path_buf(),
                expected,
                actual,
                offset: payload_offset,
            });
        }

        let op = Op::from_byte(data[12]).ok_or_else(|| StoreError::JournalCorrupted {
            path: origin.to_path_buf(),
            offset: offset + 12,
            reason: format!("invalid operation type: {}", data[12]),
        })?;

        if payload.len() < KEY_LEN_SIZE {
            return Err(StoreError::JournalCorrupted {
                path: origin.to_path_buf(),
                offset: payload_offset,
                reason: "payload too short for key length".to_string(),
            });
        }
        let key_len = read_u32(&payload[..KEY_LEN_SIZE]) as usize;
        let key_end = KEY_LEN_SIZE + key_len;
        if key_end > payload.len() {
            return Err(StoreError::JournalCorrupted {
                path: origin.to_path_buf(),
                offset: payload_offset,
                reason: format!("key length {} overruns payload of {} bytes", key_len, payload.len()),
            });
        }

        Ok(Record {
            op,
            key: payload[KEY_LEN_SIZE..key_end].to_vec(),
            value: payload[key_end..].to_vec(),
        })
    }
}

/// Payload length announced by the header at the start of `header`.
///
/// `header` must hold at least `HEADER_SIZE` bytes.
pub fn payload_len(header: &[u8]) -> u32 {
    read_u32(&header[4..8])
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
