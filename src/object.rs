//! Object header
//!
//! Every composite value stores a fixed-layout header at the front of its
//! meta row, followed by type-specific metadata.
//!
//! ## Header Layout (42 bytes)
//! ```text
//! ┌──────────┬──────────┬──────────┬──────────────┬──────────────┬──────────────┐
//! │  ID (16) │ Type (1) │  Enc (1) │ Created (8)  │ Updated (8)  │ ExpireAt (8) │
//! └──────────┴──────────┴──────────┴──────────────┴──────────────┴──────────────┘
//! ```
//! Timestamps are big-endian nanoseconds since the Unix epoch. An `ExpireAt`
//! of 0 means the object never expires.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use crate::error::{HashKvError, Result};
use crate::hash::HashMeta;

/// Encoded header size in bytes
pub const OBJECT_HEADER_LEN: usize = 42;

/// Kind of composite value stored under a meta key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ObjectType {
    String = 0,
    List = 1,
    Hash = 2,
    Set = 3,
    ZSet = 4,
}

impl TryFrom<u8> for ObjectType {
    type Error = HashKvError;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(ObjectType::String),
            1 => Ok(ObjectType::List),
            2 => Ok(ObjectType::Hash),
            3 => Ok(ObjectType::Set),
            4 => Ok(ObjectType::ZSet),
            _ => Err(HashKvError::Decode(format!("unknown object type tag {}", tag))),
        }
    }
}

/// Physical encoding of a composite value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ObjectEncoding {
    Raw = 0,
    Int = 1,
    HashTable = 2,
    LinkedList = 3,
    SkipList = 4,
}

impl TryFrom<u8> for ObjectEncoding {
    type Error = HashKvError;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(ObjectEncoding::Raw),
            1 => Ok(ObjectEncoding::Int),
            2 => Ok(ObjectEncoding::HashTable),
            3 => Ok(ObjectEncoding::LinkedList),
            4 => Ok(ObjectEncoding::SkipList),
            _ => Err(HashKvError::Decode(format!("unknown object encoding tag {}", tag))),
        }
    }
}

/// Immutable identifier of one object's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId([u8; 16]);

impl ObjectId {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Uuid::from_bytes(self.0))
    }
}

/// Generate a fresh object id
pub fn new_object_id() -> ObjectId {
    ObjectId(*Uuid::new_v4().as_bytes())
}

/// Wall clock in nanoseconds since the Unix epoch
pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as i64
}

/// Header shared by every composite value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHeader {
    pub id: ObjectId,
    pub kind: ObjectType,
    pub encoding: ObjectEncoding,
    pub created_at: i64,
    pub updated_at: i64,
    pub expire_at: i64,
}

impl ObjectHeader {
    /// Header for a brand-new object created now
    pub fn new(kind: ObjectType, encoding: ObjectEncoding) -> Self {
        let now = now();
        Self {
            id: new_object_id(),
            kind,
            encoding,
            created_at: now,
            updated_at: now,
            expire_at: 0,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(OBJECT_HEADER_LEN);
        buf.extend_from_slice(self.id.as_bytes());
        buf.push(self.kind as u8);
        buf.push(self.encoding as u8);
        buf.extend_from_slice(&(self.created_at as u64).to_be_bytes());
        buf.extend_from_slice(&(self.updated_at as u64).to_be_bytes());
        buf.extend_from_slice(&(self.expire_at as u64).to_be_bytes());
        buf
    }

    /// Decode the header from the front of `bytes`; trailing bytes are ignored
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < OBJECT_HEADER_LEN {
            return Err(HashKvError::InvalidLength {
                expected: OBJECT_HEADER_LEN,
                actual: bytes.len(),
            });
        }

        let mut id = [0u8; 16];
        id.copy_from_slice(&bytes[..16]);

        Ok(Self {
            id: ObjectId(id),
            kind: ObjectType::try_from(bytes[16])?,
            encoding: ObjectEncoding::try_from(bytes[17])?,
            created_at: read_i64(&bytes[18..26]),
            updated_at: read_i64(&bytes[26..34]),
            expire_at: read_i64(&bytes[34..42]),
        })
    }
}

/// Read a big-endian i64 from exactly 8 bytes
pub(crate) fn read_i64(bytes: &[u8]) -> i64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_be_bytes(buf) as i64
}

/// A decoded meta row, dispatched on the header's type tag
#[derive(Debug, Clone, PartialEq)]
pub enum Metadata {
    Hash(HashMeta),

    /// A kind this crate does not model; its suffix is kept verbatim
    Other {
        header: ObjectHeader,
        payload: Vec<u8>,
    },
}

impl Metadata {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = ObjectHeader::decode(bytes)?;
        let payload = &bytes[OBJECT_HEADER_LEN..];
        match header.kind {
            ObjectType::Hash => Ok(Metadata::Hash(HashMeta::decode_body(header, payload)?)),
            _ => Ok(Metadata::Other {
                header,
                payload: payload.to_vec(),
            }),
        }
    }

    pub fn header(&self) -> &ObjectHeader {
        match self {
            Metadata::Hash(meta) => &meta.header,
            Metadata::Other { header, .. } => header,
        }
    }
}
