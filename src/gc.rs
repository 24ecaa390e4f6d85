//! Garbage collection of orphaned key ranges
//!
//! Destroying a value never deletes its rows synchronously. Instead a marker
//! row naming the range prefix is written in the destroying transaction;
//! [`sweep`] later removes the rows in bounded batches, each in a transaction
//! of its own.

use crate::error::Result;
use crate::keys::Database;
use crate::store::Transaction;

/// Mark every key starting with `prefix` for collection
pub fn mark_range<T: Transaction>(txn: &mut T, db: &Database, prefix: &[u8]) -> Result<()> {
    tracing::debug!(prefix_len = prefix.len(), "marking range for gc");
    txn.set(&db.gc_key(prefix), &[])
}

/// Key prefixes currently awaiting collection
pub fn pending<T: Transaction>(txn: &T, db: &Database) -> Result<Vec<Vec<u8>>> {
    let marker_prefix = db.gc_prefix();
    let mut cursor = txn.seek(&marker_prefix)?;
    let mut ranges = Vec::new();
    while cursor.valid() && cursor.key().starts_with(&marker_prefix) {
        ranges.push(cursor.key()[marker_prefix.len()..].to_vec());
        cursor.next()?;
    }
    Ok(ranges)
}

/// Delete up to `limit` keys from marked ranges
///
/// A marker is removed once its range is empty. Returns the number of data
/// keys deleted.
pub fn sweep<T: Transaction>(txn: &mut T, db: &Database, limit: usize) -> Result<usize> {
    let mut deleted = 0;

    for prefix in pending(txn, db)? {
        if deleted >= limit {
            break;
        }

        let mut batch = Vec::new();
        let mut exhausted = true;
        {
            let mut cursor = txn.seek(&prefix)?;
            while cursor.valid() && cursor.key().starts_with(&prefix) {
                if deleted + batch.len() >= limit {
                    exhausted = false;
                    break;
                }
                batch.push(cursor.key().to_vec());
                cursor.next()?;
            }
        }

        for key in &batch {
            txn.delete(key)?;
        }
        deleted += batch.len();

        if exhausted {
            txn.delete(&db.gc_key(&prefix))?;
        }
    }

    if deleted > 0 {
        tracing::debug!(deleted, "gc sweep removed keys");
    }
    Ok(deleted)
}
