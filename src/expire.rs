//! Expiration index
//!
//! Values with a TTL get one index row ordered by expiration time, so an
//! evictor can scan due keys in order. Rows are written in the caller's
//! transaction.

use crate::error::Result;
use crate::keys::Database;
use crate::store::Transaction;

/// Register `meta_key` for eviction at `expire_at`
pub fn register<T: Transaction>(
    txn: &mut T,
    db: &Database,
    meta_key: &[u8],
    expire_at: i64,
) -> Result<()> {
    txn.set(&db.expire_key(expire_at, meta_key), meta_key)
}

/// Remove the index row written by [`register`]
pub fn deregister<T: Transaction>(
    txn: &mut T,
    db: &Database,
    meta_key: &[u8],
    expire_at: i64,
) -> Result<()> {
    txn.delete(&db.expire_key(expire_at, meta_key))
}

/// Meta keys whose expiration is at or before `now`, oldest first
pub fn due<T: Transaction>(txn: &T, db: &Database, now: i64, limit: usize) -> Result<Vec<Vec<u8>>> {
    let prefix = db.expire_prefix();
    let mut cursor = txn.seek(&prefix)?;
    let mut keys = Vec::new();

    while cursor.valid() && cursor.key().starts_with(&prefix) && keys.len() < limit {
        let suffix = &cursor.key()[prefix.len()..];
        if suffix.len() < 8 {
            cursor.next()?;
            continue;
        }
        if crate::object::read_i64(&suffix[..8]) > now {
            break;
        }
        keys.push(cursor.value().to_vec());
        cursor.next()?;
    }

    Ok(keys)
}
