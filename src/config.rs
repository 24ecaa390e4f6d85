//! Configuration for hashkv
//!
//! Centralized configuration with sensible defaults.

use crate::error::{HashKvError, Result};

/// Main configuration for a hashkv database
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Keyspace Configuration
    // -------------------------------------------------------------------------
    /// Prefix shared by every key this database writes
    pub namespace: String,

    /// Logical database index inside the namespace
    pub db_id: u32,

    // -------------------------------------------------------------------------
    // Hash Configuration
    // -------------------------------------------------------------------------
    /// Shard count given to newly created hashes (0 disables sharding)
    pub default_shard_count: i64,

    // -------------------------------------------------------------------------
    // GC Configuration
    // -------------------------------------------------------------------------
    /// Max keys removed by a single GC sweep
    pub gc_batch_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: "hashkv".to_string(),
            db_id: 0,
            default_shard_count: 0,
            gc_batch_limit: 256,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the values before a database is built on top of them
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            return Err(HashKvError::Config("namespace must not be empty".to_string()));
        }
        if self.default_shard_count < 0 {
            return Err(HashKvError::Config(format!(
                "default shard count must be >= 0, got {}",
                self.default_shard_count
            )));
        }
        if self.gc_batch_limit == 0 {
            return Err(HashKvError::Config("gc batch limit must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the key namespace
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = namespace.into();
        self
    }

    /// Set the logical database index
    pub fn db_id(mut self, id: u32) -> Self {
        self.config.db_id = id;
        self
    }

    /// Set the shard count for new hashes
    pub fn default_shard_count(mut self, count: i64) -> Self {
        self.config.default_shard_count = count;
        self
    }

    /// Set the per-sweep GC key limit
    pub fn gc_batch_limit(mut self, limit: usize) -> Self {
        self.config.gc_batch_limit = limit;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
