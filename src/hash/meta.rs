//! Hash and shard metadata codecs
//!
//! ## Hash meta row
//! ```text
//! ┌──────────────────┬────────────────┬────────────────┐
//! │ Object hdr (42)  │ Fields (8, BE) │ Shards (8, BE) │
//! └──────────────────┴────────────────┴────────────────┘
//! ```
//!
//! ## Shard row (16 bytes)
//! ```text
//! ┌────────────────┬─────────────────┐
//! │ Fields (8, BE) │ Updated (8, BE) │
//! └────────────────┴─────────────────┘
//! ```

use crate::error::{HashKvError, Result};
use crate::object::{read_i64, Metadata, ObjectEncoding, ObjectHeader, ObjectType};

/// Size of the hash-specific suffix after the object header
pub const HASH_META_BODY_LEN: usize = 16;

/// Size of an encoded shard row
pub const SHARD_META_LEN: usize = 16;

/// Metadata row of one hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashMeta {
    pub header: ObjectHeader,

    /// Live field count. Only authoritative while `shard_count == 0`.
    pub field_count: i64,

    /// Number of shard rows carrying the count; 0 disables sharding
    pub shard_count: i64,
}

impl HashMeta {
    /// Fresh metadata for a hash that does not exist yet
    pub fn new(shard_count: i64) -> Self {
        Self {
            header: ObjectHeader::new(ObjectType::Hash, ObjectEncoding::HashTable),
            field_count: 0,
            shard_count,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = self.header.encode();
        buf.reserve(HASH_META_BODY_LEN);
        buf.extend_from_slice(&(self.field_count as u64).to_be_bytes());
        buf.extend_from_slice(&(self.shard_count as u64).to_be_bytes());
        buf
    }

    /// Decode a meta row, failing with `TypeMismatch` if it is not a hash
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        match Metadata::decode(bytes)? {
            Metadata::Hash(meta) => Ok(meta),
            Metadata::Other { .. } => Err(HashKvError::TypeMismatch),
        }
    }

    /// Decode the hash-specific suffix that follows an already decoded header
    pub(crate) fn decode_body(header: ObjectHeader, body: &[u8]) -> Result<Self> {
        if body.len() != HASH_META_BODY_LEN {
            return Err(HashKvError::InvalidLength {
                expected: HASH_META_BODY_LEN,
                actual: body.len(),
            });
        }
        Ok(Self {
            header,
            field_count: read_i64(&body[..8]),
            shard_count: read_i64(&body[8..16]),
        })
    }
}

/// Metadata row of one shard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShardMeta {
    pub field_count: i64,
    pub updated_at: i64,
}

impl ShardMeta {
    pub fn encode(&self) -> [u8; SHARD_META_LEN] {
        let mut buf = [0u8; SHARD_META_LEN];
        buf[..8].copy_from_slice(&(self.field_count as u64).to_be_bytes());
        buf[8..].copy_from_slice(&(self.updated_at as u64).to_be_bytes());
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SHARD_META_LEN {
            return Err(HashKvError::InvalidLength {
                expected: SHARD_META_LEN,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            field_count: read_i64(&bytes[..8]),
            updated_at: read_i64(&bytes[8..16]),
        })
    }
}
