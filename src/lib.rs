//! # hashkv
//!
//! A hash-map composite type layered over a transactional, ordered
//! key-value store:
//! - Field-level reads and writes inside the caller's transaction
//! - Field count kept in the meta row, or sharded over several rows to
//!   avoid a single hot counter
//! - Logical destruction that hands key ranges to an asynchronous GC
//! - Expiration index shared with the rest of the keyspace
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Engine (one txn per command)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Hash handle                             │
//! │          (meta cache, field ops, destruction)                │
//! └──────┬──────────────────┬─────────────────────┬─────────────┘
//!        │                  │                     │
//!        ▼                  ▼                     ▼
//!  ┌────────────┐    ┌─────────────┐     ┌────────────────┐
//!  │ Key scheme │    │ Shard router│     │  GC / Expire   │
//!  └─────┬──────┘    └──────┬──────┘     └───────┬────────┘
//!        └──────────────────┼────────────────────┘
//!                           ▼
//!                  ┌──────────────────┐
//!                  │ Transaction (KV) │
//!                  └──────────────────┘
//! ```
//!
//! ## Example
//! ```
//! use hashkv::{Config, Database, Hash, MemStore, Store, Transaction};
//!
//! let db = Database::new(Config::default()).unwrap();
//! let store = MemStore::new();
//!
//! let mut txn = store.begin().unwrap();
//! let mut hash = Hash::open(&db, &mut txn, b"user:1").unwrap();
//! assert_eq!(hash.hset(b"name", b"ada").unwrap(), 1);
//! assert_eq!(hash.hlen().unwrap(), 1);
//! txn.commit().unwrap();
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod object;
pub mod keys;
pub mod store;
pub mod gc;
pub mod expire;
pub mod hash;
pub mod protocol;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{HashKvError, Result};
pub use config::Config;
pub use engine::Engine;
pub use hash::{Hash, HashMeta, ShardMeta};
pub use keys::Database;
pub use store::{MemStore, Store, Transaction};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of hashkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
