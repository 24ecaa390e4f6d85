//! In-memory store
//!
//! BTreeMap-based committed state with RwLock, plus per-transaction
//! write buffers.
//!
//! ## Concurrency Model
//! - Committed rows live behind one `RwLock` shared by every transaction
//! - Reads take the read lock; only commit takes the write lock
//! - A transaction records the commit version it started at. At commit it
//!   aborts with `Conflict` if any key it writes was committed after that
//!   version (first committer wins)

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{HashKvError, Result};

use super::{Cursor, Store, Transaction, WriteEntry};

/// Committed rows read per cursor refill
const SCAN_CHUNK: usize = 64;

#[derive(Default)]
struct Committed {
    /// Live rows in key order
    rows: BTreeMap<Vec<u8>, Vec<u8>>,

    /// Commit version that last wrote each key (deletes included)
    versions: HashMap<Vec<u8>, u64>,

    /// Latest commit version
    version: u64,
}

/// Shared in-memory store. Cloning is cheap and shares state.
#[derive(Clone, Default)]
pub struct MemStore {
    committed: Arc<RwLock<Committed>>,
}

impl MemStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a committed value, outside any transaction
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.committed.read().rows.get(key).cloned()
    }

    /// All committed rows whose key starts with `prefix`
    pub fn scan_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let committed = self.committed.read();
        committed
            .rows
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Number of committed rows
    pub fn len(&self) -> usize {
        self.committed.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Latest commit version
    pub fn version(&self) -> u64 {
        self.committed.read().version
    }
}

impl Store for MemStore {
    type Txn = MemTransaction;

    fn begin(&self) -> Result<MemTransaction> {
        Ok(MemTransaction {
            committed: Arc::clone(&self.committed),
            start_version: self.version(),
            writes: BTreeMap::new(),
        })
    }
}

/// Transaction over a [`MemStore`]
pub struct MemTransaction {
    committed: Arc<RwLock<Committed>>,
    start_version: u64,
    writes: BTreeMap<Vec<u8>, WriteEntry>,
}

impl MemTransaction {
    /// Number of buffered writes (deletes included)
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }
}

impl Transaction for MemTransaction {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.writes.get(key) {
            return Ok(match entry {
                WriteEntry::Value(value) => Some(value.clone()),
                WriteEntry::Tombstone => None,
            });
        }
        Ok(self.committed.read().rows.get(key).cloned())
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.writes
            .insert(key.to_vec(), WriteEntry::Value(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.writes.insert(key.to_vec(), WriteEntry::Tombstone);
        Ok(())
    }

    fn seek(&self, start: &[u8]) -> Result<Box<dyn Cursor + '_>> {
        Ok(Box::new(MemCursor::new(self, start)))
    }

    fn batch_get(&self, keys: &[Vec<u8>]) -> Result<HashMap<Vec<u8>, Vec<u8>>> {
        let committed = self.committed.read();
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            let value = match self.writes.get(key) {
                Some(WriteEntry::Value(value)) => Some(value.clone()),
                Some(WriteEntry::Tombstone) => None,
                None => committed.rows.get(key).cloned(),
            };
            if let Some(value) = value {
                found.insert(key.clone(), value);
            }
        }
        Ok(found)
    }

    fn commit(self) -> Result<()> {
        if self.writes.is_empty() {
            return Ok(());
        }

        let mut committed = self.committed.write();

        for key in self.writes.keys() {
            if let Some(&version) = committed.versions.get(key) {
                if version > self.start_version {
                    tracing::debug!(
                        start_version = self.start_version,
                        conflicting_version = version,
                        "write conflict on commit"
                    );
                    return Err(HashKvError::Conflict);
                }
            }
        }

        committed.version += 1;
        let version = committed.version;
        for (key, entry) in self.writes {
            match entry {
                WriteEntry::Value(value) => {
                    committed.rows.insert(key.clone(), value);
                }
                WriteEntry::Tombstone => {
                    committed.rows.remove(&key);
                }
            }
            committed.versions.insert(key, version);
        }

        Ok(())
    }

    fn rollback(self) -> Result<()> {
        Ok(())
    }
}

/// Lazy ordered cursor over a [`MemTransaction`]
///
/// Each refill reads at most [`SCAN_CHUNK`] committed rows and buffered
/// writes after the last returned key, so a scan costs what it consumes.
pub struct MemCursor<'a> {
    txn: &'a MemTransaction,
    buffer: VecDeque<(Vec<u8>, Vec<u8>)>,
    /// Lower bound of the next refill
    resume: Bound<Vec<u8>>,
    done: bool,
}

impl<'a> MemCursor<'a> {
    fn new(txn: &'a MemTransaction, start: &[u8]) -> Self {
        let mut cursor = Self {
            txn,
            buffer: VecDeque::new(),
            resume: Bound::Included(start.to_vec()),
            done: false,
        };
        cursor.fill();
        cursor
    }

    /// Refill until an entry is buffered or both sources are exhausted
    fn fill(&mut self) {
        while self.buffer.is_empty() && !self.done {
            self.fill_chunk();
        }
    }

    fn fill_chunk(&mut self) {
        let txn = self.txn;
        let lower: Bound<&[u8]> = match &self.resume {
            Bound::Included(key) => Bound::Included(key.as_slice()),
            Bound::Excluded(key) => Bound::Excluded(key.as_slice()),
            Bound::Unbounded => Bound::Unbounded,
        };
        let range = (lower, Bound::Unbounded);

        let rows: Vec<(Vec<u8>, Vec<u8>)> = {
            let committed = txn.committed.read();
            committed
                .rows
                .range::<[u8], _>(range)
                .take(SCAN_CHUNK)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };
        let writes: Vec<(&Vec<u8>, &WriteEntry)> =
            txn.writes.range::<[u8], _>(range).take(SCAN_CHUNK).collect();

        // Both sources are complete up to the smallest last key of any
        // source that filled its chunk
        let mut upper: Option<&[u8]> = None;
        if rows.len() == SCAN_CHUNK {
            upper = rows.last().map(|(k, _)| k.as_slice());
        }
        if writes.len() == SCAN_CHUNK {
            if let Some((k, _)) = writes.last() {
                let k = k.as_slice();
                upper = Some(match upper {
                    Some(u) if u < k => u,
                    _ => k,
                });
            }
        }
        let within = |key: &[u8]| upper.map_or(true, |u| key <= u);

        let mut merged: BTreeMap<&[u8], &[u8]> = BTreeMap::new();
        for (key, value) in &rows {
            if within(key.as_slice()) {
                merged.insert(key.as_slice(), value.as_slice());
            }
        }
        for &(key, entry) in &writes {
            if !within(key.as_slice()) {
                continue;
            }
            match entry {
                WriteEntry::Value(value) => {
                    merged.insert(key.as_slice(), value.as_slice());
                }
                WriteEntry::Tombstone => {
                    merged.remove(key.as_slice());
                }
            }
        }
        self.buffer
            .extend(merged.into_iter().map(|(k, v)| (k.to_vec(), v.to_vec())));

        match upper {
            Some(last) => self.resume = Bound::Excluded(last.to_vec()),
            None => self.done = true,
        }
    }
}

impl Cursor for MemCursor<'_> {
    fn valid(&self) -> bool {
        !self.buffer.is_empty()
    }

    fn key(&self) -> &[u8] {
        self.buffer.front().map(|(k, _)| k.as_slice()).unwrap_or(&[])
    }

    fn value(&self) -> &[u8] {
        self.buffer.front().map(|(_, v)| v.as_slice()).unwrap_or(&[])
    }

    fn next(&mut self) -> Result<()> {
        self.buffer.pop_front();
        self.fill();
        Ok(())
    }
}
