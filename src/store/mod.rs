//! Store Module
//!
//! The transactional, ordered key-value substrate the hash type is built on.
//!
//! ## Responsibilities
//! - Point reads, writes and deletes inside one transaction
//! - Ordered scans starting at a key (`seek`)
//! - Batched point reads in a single round trip
//! - Atomic commit with write-write conflict detection
//!
//! The hash layer only talks to the [`Transaction`] trait. [`MemStore`] is the
//! in-process implementation used by the engine, the shell and the tests.

mod memory;

use std::collections::HashMap;

use crate::error::Result;

pub use memory::{MemCursor, MemStore, MemTransaction};

/// Entry held in a transaction's write buffer
#[derive(Debug, Clone, PartialEq)]
pub enum WriteEntry {
    /// A live value
    Value(Vec<u8>),

    /// A tombstone (deleted key)
    Tombstone,
}

/// Forward cursor over an ordered scan
pub trait Cursor {
    /// Whether the cursor points at an entry
    fn valid(&self) -> bool;

    /// Key at the current position; empty when not valid
    fn key(&self) -> &[u8];

    /// Value at the current position; empty when not valid
    fn value(&self) -> &[u8];

    /// Advance to the next entry
    fn next(&mut self) -> Result<()>;
}

/// A single transaction against the substrate
pub trait Transaction {
    /// Point read. A missing key is `Ok(None)`.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Unconditional write
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete a key (no error if it does not exist)
    fn delete(&mut self, key: &[u8]) -> Result<()>;

    /// Ordered scan over every key >= `start`
    fn seek(&self, start: &[u8]) -> Result<Box<dyn Cursor + '_>>;

    /// Batched point read. Missing keys are omitted from the map.
    fn batch_get(&self, keys: &[Vec<u8>]) -> Result<HashMap<Vec<u8>, Vec<u8>>>;

    /// Make every buffered write visible atomically
    fn commit(self) -> Result<()>
    where
        Self: Sized;

    /// Drop every buffered write
    fn rollback(self) -> Result<()>
    where
        Self: Sized;
}

/// Something that hands out transactions
pub trait Store {
    type Txn: Transaction;

    fn begin(&self) -> Result<Self::Txn>;
}
