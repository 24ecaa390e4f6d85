//! Shard router
//!
//! Spreads a hash's field count over `shard_count` rows so concurrent writers
//! touching different fields do not all rewrite the same meta row.

use std::collections::{BTreeMap, HashMap};

use crate::error::Result;
use crate::keys::Database;
use crate::object::ObjectId;

use super::meta::ShardMeta;

/// Routes fields to shard rows for one hash
#[derive(Debug, Clone, Copy)]
pub struct ShardRouter {
    shard_count: i64,
}

impl ShardRouter {
    pub fn new(shard_count: i64) -> Self {
        Self { shard_count }
    }

    /// Sharding is on for any non-zero shard count
    pub fn is_active(&self) -> bool {
        self.shard_count != 0
    }

    pub fn shard_count(&self) -> i64 {
        self.shard_count
    }

    /// CRC32 (IEEE) of the field, reduced into `[0, shard_count)`
    pub fn shard_index(&self, field: &[u8]) -> i64 {
        if !self.is_active() {
            return 0;
        }
        i64::from(crc32fast::hash(field)).rem_euclid(self.shard_count)
    }

    /// Keys of every shard row, indices `0..shard_count`, once each
    pub fn shard_keys(&self, db: &Database, id: &ObjectId) -> Vec<Vec<u8>> {
        (0..self.shard_count.max(0))
            .map(|index| db.shard_key(id, index))
            .collect()
    }

    /// Number of fields owned by each shard
    pub fn count_by_shard<'f, I>(&self, fields: I) -> BTreeMap<i64, i64>
    where
        I: IntoIterator<Item = &'f [u8]>,
    {
        let mut counts = BTreeMap::new();
        for field in fields {
            *counts.entry(self.shard_index(field)).or_insert(0) += 1;
        }
        counts
    }

    /// Sum the shard rows found in `rows`; missing shards count as empty
    pub fn aggregate(
        &self,
        db: &Database,
        id: &ObjectId,
        rows: &HashMap<Vec<u8>, Vec<u8>>,
    ) -> Result<ShardMeta> {
        let mut total = ShardMeta::default();
        for key in self.shard_keys(db, id) {
            if let Some(raw) = rows.get(&key) {
                let shard = ShardMeta::decode(raw)?;
                total.field_count += shard.field_count;
                total.updated_at = total.updated_at.max(shard.updated_at);
            }
        }
        Ok(total)
    }
}
