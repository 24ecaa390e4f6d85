//! Hash handle
//!
//! A [`Hash`] is bound to one transaction and one user key. It loads (or
//! initializes) the metadata once and keeps it in memory; every metadata
//! change is written back to the transaction before the operation returns.
//! The handle never locks or retries: isolation and atomicity come from the
//! transaction it borrows.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{HashKvError, Result};
use crate::expire;
use crate::gc;
use crate::keys::{item_key, item_prefix, Database};
use crate::object::{now, Metadata};
use crate::store::Transaction;

use super::meta::{HashMeta, ShardMeta};
use super::shard::ShardRouter;

/// Field-level access to one hash
pub struct Hash<'a, T: Transaction> {
    db: &'a Database,
    txn: &'a mut T,
    key: Vec<u8>,
    meta: HashMeta,
    /// Whether a meta row exists in the transaction for this object
    persisted: bool,
}

impl<'a, T: Transaction> Hash<'a, T> {
    /// Load the hash stored at `key`, or prepare a new empty one
    ///
    /// A new hash is not written until its first field is created.
    pub fn open(db: &'a Database, txn: &'a mut T, key: &[u8]) -> Result<Self> {
        let meta_key = db.meta_key(key);

        let (meta, persisted) = match txn.get(&meta_key)? {
            None => (HashMeta::new(db.config().default_shard_count), false),
            Some(raw) => match Metadata::decode(&raw)? {
                Metadata::Hash(meta) => (meta, true),
                Metadata::Other { header, .. } => {
                    tracing::warn!(kind = ?header.kind, "hash operation on non-hash key");
                    return Err(HashKvError::TypeMismatch);
                }
            },
        };

        Ok(Self {
            db,
            txn,
            key: key.to_vec(),
            meta,
            persisted,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn meta(&self) -> &HashMeta {
        &self.meta
    }

    /// Whether the hash has a stored meta row
    pub fn exists(&self) -> bool {
        self.persisted
    }

    /// Expiration timestamp, if one is set
    pub fn expire_at(&self) -> Option<i64> {
        (self.meta.header.expire_at > 0).then_some(self.meta.header.expire_at)
    }

    fn router(&self) -> ShardRouter {
        ShardRouter::new(self.meta.shard_count)
    }

    fn data_key(&self) -> Vec<u8> {
        self.db.data_key(&self.meta.header.id)
    }

    fn field_key(&self, field: &[u8]) -> Vec<u8> {
        item_key(&self.data_key(), field)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Value of `field`, `None` if absent
    pub fn hget(&self, field: &[u8]) -> Result<Option<Vec<u8>>> {
        self.txn.get(&self.field_key(field))
    }

    /// Values of `fields` in input order, fetched in one batch
    pub fn hmget<F: AsRef<[u8]>>(&self, fields: &[F]) -> Result<Vec<Option<Vec<u8>>>> {
        let data_key = self.data_key();
        let keys: Vec<Vec<u8>> = fields
            .iter()
            .map(|field| item_key(&data_key, field.as_ref()))
            .collect();
        let found = self.txn.batch_get(&keys)?;
        Ok(keys.iter().map(|key| found.get(key).cloned()).collect())
    }

    pub fn hexists(&self, field: &[u8]) -> Result<bool> {
        Ok(self.txn.get(&self.field_key(field))?.is_some())
    }

    /// Every field/value pair in field order
    ///
    /// The scan is bounded by the current length rather than a page size.
    pub fn hgetall(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut remaining = self.hlen()?;
        let mut pairs = Vec::new();
        if remaining <= 0 {
            return Ok(pairs);
        }

        let prefix = item_prefix(&self.data_key());
        let mut cursor = self.txn.seek(&prefix)?;
        while remaining > 0 && cursor.valid() && cursor.key().starts_with(&prefix) {
            pairs.push((cursor.key()[prefix.len()..].to_vec(), cursor.value().to_vec()));
            remaining -= 1;
            cursor.next()?;
        }
        Ok(pairs)
    }

    /// Number of fields
    ///
    /// Sharded hashes sum every shard row in one batch read.
    pub fn hlen(&self) -> Result<i64> {
        let router = self.router();
        if !router.is_active() {
            return Ok(self.meta.field_count);
        }

        let keys = router.shard_keys(self.db, &self.meta.header.id);
        let rows = self.txn.batch_get(&keys)?;
        let total = router.aggregate(self.db, &self.meta.header.id, &rows)?;
        Ok(total.field_count)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Set `field` to `value`. Returns 1 if the field was created, 0 if it
    /// was overwritten.
    pub fn hset(&mut self, field: &[u8], value: &[u8]) -> Result<i64> {
        let key = self.field_key(field);
        let existed = self.txn.get(&key)?.is_some();

        self.txn.set(&key, value)?;
        if existed {
            return Ok(0);
        }

        self.record_created(&[field])?;
        Ok(1)
    }

    /// Set `field` only if it does not exist. Returns 1 if written.
    pub fn hsetnx(&mut self, field: &[u8], value: &[u8]) -> Result<i64> {
        let key = self.field_key(field);
        if self.txn.get(&key)?.is_some() {
            return Ok(0);
        }

        self.txn.set(&key, value)?;
        self.record_created(&[field])?;
        Ok(1)
    }

    /// Add `delta` to the integer stored at `field` (absent counts as 0)
    pub fn hincrby(&mut self, field: &[u8], delta: i64) -> Result<i64> {
        let key = self.field_key(field);
        let current = self.txn.get(&key)?;

        let base = match &current {
            Some(raw) => parse_i64(raw)?,
            None => 0,
        };
        let value = base.checked_add(delta).ok_or(HashKvError::Overflow)?;

        self.txn.set(&key, value.to_string().as_bytes())?;
        if current.is_none() {
            self.record_created(&[field])?;
        }
        Ok(value)
    }

    /// Add `delta` to the float stored at `field` (absent counts as 0)
    pub fn hincrbyfloat(&mut self, field: &[u8], delta: f64) -> Result<f64> {
        if !delta.is_finite() {
            return Err(HashKvError::NotANumber(delta.to_string()));
        }

        let key = self.field_key(field);
        let current = self.txn.get(&key)?;

        let base = match &current {
            Some(raw) => parse_f64(raw)?,
            None => 0.0,
        };
        let value = base + delta;
        if !value.is_finite() {
            return Err(HashKvError::NotANumber(
                "increment would produce NaN or Infinity".to_string(),
            ));
        }

        self.txn.set(&key, value.to_string().as_bytes())?;
        if current.is_none() {
            self.record_created(&[field])?;
        }
        Ok(value)
    }

    /// Set several fields at once
    ///
    /// Prior existence is checked with one batch read, and the metadata is
    /// written at most once.
    pub fn hmset<F, V>(&mut self, fields: &[F], values: &[V]) -> Result<()>
    where
        F: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        if fields.len() != values.len() {
            return Err(HashKvError::InvalidArgument(format!(
                "{} fields but {} values",
                fields.len(),
                values.len()
            )));
        }

        let data_key = self.data_key();
        let keys: Vec<Vec<u8>> = fields
            .iter()
            .map(|field| item_key(&data_key, field.as_ref()))
            .collect();
        let existing = self.txn.batch_get(&keys)?;

        let mut seen = HashSet::new();
        let mut created: Vec<&[u8]> = Vec::new();
        for ((field, value), key) in fields.iter().zip(values).zip(&keys) {
            self.txn.set(key, value.as_ref())?;
            if !existing.contains_key(key) && seen.insert(key.as_slice()) {
                created.push(field.as_ref());
            }
        }

        self.record_created(&created)
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    /// Remove `fields`, returning how many existed
    ///
    /// Removing every remaining field destroys the hash.
    pub fn hdel<F: AsRef<[u8]>>(&mut self, fields: &[F]) -> Result<i64> {
        let router = self.router();
        let data_key = self.data_key();

        let mut seen = HashSet::new();
        let mut targets: Vec<(&[u8], Vec<u8>)> = Vec::new();
        for field in fields {
            let field = field.as_ref();
            let key = item_key(&data_key, field);
            if seen.insert(key.clone()) {
                targets.push((field, key));
            }
        }

        let mut lookup: Vec<Vec<u8>> = targets.iter().map(|(_, key)| key.clone()).collect();
        if router.is_active() {
            lookup.extend(router.shard_keys(self.db, &self.meta.header.id));
        }
        let found = self.txn.batch_get(&lookup)?;

        let removed: Vec<(&[u8], Vec<u8>)> = targets
            .into_iter()
            .filter(|(_, key)| found.contains_key(key))
            .collect();
        let removed_count = removed.len() as i64;
        if removed_count == 0 {
            return Ok(0);
        }

        let length = if router.is_active() {
            router
                .aggregate(self.db, &self.meta.header.id, &found)?
                .field_count
        } else {
            self.meta.field_count
        };

        if removed_count >= length {
            self.destroy()?;
            return Ok(removed_count);
        }

        for (_, key) in &removed {
            self.txn.delete(key)?;
        }

        if router.is_active() {
            let deltas: BTreeMap<i64, i64> = router
                .count_by_shard(removed.iter().map(|(field, _)| *field))
                .into_iter()
                .map(|(index, count)| (index, -count))
                .collect();
            self.apply_shard_deltas(&deltas, &found)?;
        } else {
            self.meta.field_count -= removed_count;
            self.save_meta()?;
        }

        Ok(removed_count)
    }

    /// Delete the hash
    ///
    /// Removes the meta row and hands the field range (and the shard range
    /// when sharded) to GC. The handle is left describing a new, empty hash.
    /// A hash that was never saved is left untouched.
    pub fn destroy(&mut self) -> Result<()> {
        if !self.persisted {
            return Ok(());
        }

        let meta_key = self.db.meta_key(&self.key);
        let data_key = self.data_key();

        self.txn.delete(&meta_key)?;
        gc::mark_range(&mut *self.txn, self.db, &data_key)?;

        let router = self.router();
        if router.is_active() {
            // Sharded creates never touch the meta row, only their shard row,
            // so every shard row is tombstoned to conflict with them.
            for shard_key in router.shard_keys(self.db, &self.meta.header.id) {
                self.txn.delete(&shard_key)?;
            }
            let shard_prefix = self.db.shard_prefix(&self.meta.header.id);
            gc::mark_range(&mut *self.txn, self.db, &shard_prefix)?;
        }

        if self.meta.header.expire_at > 0 {
            expire::deregister(&mut *self.txn, self.db, &meta_key, self.meta.header.expire_at)?;
        }

        tracing::debug!(
            object_id = %self.meta.header.id,
            shards = self.meta.shard_count,
            "hash destroyed"
        );

        self.meta = HashMeta::new(self.db.config().default_shard_count);
        self.persisted = false;
        Ok(())
    }

    // =========================================================================
    // Expiration
    // =========================================================================

    /// Expire the hash at `at` (nanoseconds since the epoch)
    ///
    /// Returns false if the hash does not exist.
    pub fn expire(&mut self, at: i64) -> Result<bool> {
        if at <= 0 {
            return Err(HashKvError::InvalidArgument(format!(
                "expiration must be positive, got {}",
                at
            )));
        }
        if !self.persisted {
            return Ok(false);
        }

        let meta_key = self.db.meta_key(&self.key);
        let previous = self.meta.header.expire_at;
        if previous > 0 {
            expire::deregister(&mut *self.txn, self.db, &meta_key, previous)?;
        }
        expire::register(&mut *self.txn, self.db, &meta_key, at)?;

        self.meta.header.expire_at = at;
        self.save_meta()?;
        Ok(true)
    }

    /// Remove any expiration. Returns whether one was set.
    pub fn persist(&mut self) -> Result<bool> {
        if !self.persisted || self.meta.header.expire_at == 0 {
            return Ok(false);
        }

        let meta_key = self.db.meta_key(&self.key);
        expire::deregister(&mut *self.txn, self.db, &meta_key, self.meta.header.expire_at)?;

        self.meta.header.expire_at = 0;
        self.save_meta()?;
        Ok(true)
    }

    // =========================================================================
    // Metadata Maintenance
    // =========================================================================

    fn save_meta(&mut self) -> Result<()> {
        self.meta.header.updated_at = now();
        let meta_key = self.db.meta_key(&self.key);
        self.txn.set(&meta_key, &self.meta.encode())?;
        self.persisted = true;
        Ok(())
    }

    /// Account for newly created fields
    ///
    /// Unsharded hashes bump the meta count. Sharded hashes bump the owning
    /// shard rows and only write the meta row if it does not exist yet.
    fn record_created(&mut self, created: &[&[u8]]) -> Result<()> {
        if created.is_empty() {
            return Ok(());
        }

        let router = self.router();
        if !router.is_active() {
            self.meta.field_count += created.len() as i64;
            return self.save_meta();
        }

        let deltas = router.count_by_shard(created.iter().copied());
        let keys: Vec<Vec<u8>> = deltas
            .keys()
            .map(|&index| self.db.shard_key(&self.meta.header.id, index))
            .collect();
        let rows = self.txn.batch_get(&keys)?;
        self.apply_shard_deltas(&deltas, &rows)?;

        if !self.persisted {
            self.save_meta()?;
        }
        Ok(())
    }

    /// Rewrite each shard in `deltas`, starting from its row in `rows`
    fn apply_shard_deltas(
        &mut self,
        deltas: &BTreeMap<i64, i64>,
        rows: &HashMap<Vec<u8>, Vec<u8>>,
    ) -> Result<()> {
        let updated_at = now();
        for (&index, &delta) in deltas {
            let key = self.db.shard_key(&self.meta.header.id, index);
            let mut shard = match rows.get(&key) {
                Some(raw) => ShardMeta::decode(raw)?,
                None => ShardMeta::default(),
            };
            shard.field_count += delta;
            shard.updated_at = updated_at;
            self.txn.set(&key, &shard.encode())?;
            tracing::trace!(shard = index, count = shard.field_count, "shard updated");
        }
        Ok(())
    }
}

fn parse_i64(raw: &[u8]) -> Result<i64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|text| text.parse::<i64>().ok())
        .ok_or_else(|| HashKvError::NotANumber(String::from_utf8_lossy(raw).into_owned()))
}

fn parse_f64(raw: &[u8]) -> Result<f64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|text| text.parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .ok_or_else(|| HashKvError::NotANumber(String::from_utf8_lossy(raw).into_owned()))
}
