//! Engine Module
//!
//! Runs hash commands against a store.
//!
//! ## Responsibilities
//! - Open one transaction per command
//! - Route commands to the hash handle
//! - Commit on success, roll back on error
//! - Drive GC sweeps and expiration eviction, each in its own transaction

use crate::config::Config;
use crate::error::Result;
use crate::expire;
use crate::gc;
use crate::hash::Hash;
use crate::keys::Database;
use crate::object::now;
use crate::protocol::{Command, Reply};
use crate::store::{Store, Transaction};

/// The command engine
///
/// Holds no locks of its own: concurrent `execute` calls each get their own
/// transaction, and conflicting commits are rejected by the store.
pub struct Engine<S: Store> {
    db: Database,
    store: S,
}

impl<S: Store> Engine<S> {
    /// Create an engine over `store`
    pub fn new(config: Config, store: S) -> Result<Self> {
        let db = Database::new(config)?;
        tracing::debug!(
            namespace = %db.config().namespace,
            db = db.config().db_id,
            shards = db.config().default_shard_count,
            "engine ready"
        );
        Ok(Self { db, store })
    }

    /// Execute a command in its own transaction
    pub fn execute(&self, command: Command) -> Result<Reply> {
        tracing::debug!(command = command.command_type().name(), "execute");

        let mut txn = self.store.begin()?;
        match Self::apply(&self.db, &mut txn, command) {
            Ok(reply) => {
                txn.commit()?;
                Ok(reply)
            }
            Err(err) => {
                if let Err(rollback_err) = txn.rollback() {
                    tracing::warn!("rollback failed: {}", rollback_err);
                }
                Err(err)
            }
        }
    }

    fn apply(db: &Database, txn: &mut S::Txn, command: Command) -> Result<Reply> {
        let reply = match command {
            Command::Ping => Reply::Pong,
            Command::HSet { key, field, value } => {
                Reply::Integer(Hash::open(db, txn, &key)?.hset(&field, &value)?)
            }
            Command::HSetNx { key, field, value } => {
                Reply::Integer(Hash::open(db, txn, &key)?.hsetnx(&field, &value)?)
            }
            Command::HGet { key, field } => Reply::Bulk(Hash::open(db, txn, &key)?.hget(&field)?),
            Command::HMGet { key, fields } => {
                Reply::Array(Hash::open(db, txn, &key)?.hmget(&fields)?)
            }
            Command::HMSet { key, pairs } => {
                let (fields, values): (Vec<Vec<u8>>, Vec<Vec<u8>>) = pairs.into_iter().unzip();
                Hash::open(db, txn, &key)?.hmset(&fields, &values)?;
                Reply::Ok
            }
            Command::HDel { key, fields } => {
                Reply::Integer(Hash::open(db, txn, &key)?.hdel(&fields)?)
            }
            Command::HExists { key, field } => {
                Reply::Integer(i64::from(Hash::open(db, txn, &key)?.hexists(&field)?))
            }
            Command::HGetAll { key } => {
                let pairs = Hash::open(db, txn, &key)?.hgetall()?;
                Reply::Array(
                    pairs
                        .into_iter()
                        .flat_map(|(field, value)| [Some(field), Some(value)])
                        .collect(),
                )
            }
            Command::HLen { key } => Reply::Integer(Hash::open(db, txn, &key)?.hlen()?),
            Command::HIncrBy { key, field, delta } => {
                Reply::Integer(Hash::open(db, txn, &key)?.hincrby(&field, delta)?)
            }
            Command::HIncrByFloat { key, field, delta } => {
                Reply::Float(Hash::open(db, txn, &key)?.hincrbyfloat(&field, delta)?)
            }
            Command::HExpireAt { key, at } => {
                Reply::Integer(i64::from(Hash::open(db, txn, &key)?.expire(at)?))
            }
            Command::HPersist { key } => {
                Reply::Integer(i64::from(Hash::open(db, txn, &key)?.persist()?))
            }
        };
        Ok(reply)
    }

    /// Run one GC sweep; returns the number of keys removed
    pub fn collect_garbage(&self) -> Result<usize> {
        let mut txn = self.store.begin()?;
        let deleted = gc::sweep(&mut txn, &self.db, self.db.config().gc_batch_limit)?;
        txn.commit()?;
        Ok(deleted)
    }

    /// Destroy every hash of this database whose expiration is due
    pub fn evict_expired(&self) -> Result<usize> {
        let mut txn = self.store.begin()?;
        let due = expire::due(&txn, &self.db, now(), self.db.config().gc_batch_limit)?;

        let mut evicted = 0;
        for meta_key in due {
            let Some(user_key) = self.db.user_key(&meta_key) else {
                continue;
            };
            let mut hash = Hash::open(&self.db, &mut txn, user_key)?;
            if hash.exists() {
                hash.destroy()?;
                evicted += 1;
            }
        }

        txn.commit()?;
        if evicted > 0 {
            tracing::info!(evicted, "expired hashes evicted");
        }
        Ok(evicted)
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &Config {
        self.db.config()
    }
}
