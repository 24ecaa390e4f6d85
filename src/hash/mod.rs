//! Hash Module
//!
//! The hash composite type: one user key mapping to many field → value
//! pairs, stored as individual rows in the substrate.
//!
//! ## Storage Layout
//! ```text
//!   meta key ──► HashMeta (header + field count + shard count)
//!                    │ object id
//!                    ▼
//!   data key:field1 ──► value1
//!   data key:field2 ──► value2
//!   ...
//!   shard key 0 ──► ShardMeta (only while shard count > 0)
//!   shard key 1 ──► ShardMeta
//! ```
//!
//! ## Length Accounting
//! - Unsharded: the count lives in the meta row
//! - Sharded: each field is owned by `crc32(field) % shard_count`, and the
//!   length is the sum of every shard row. Creating or deleting fields only
//!   rewrites the shard rows that own them.

mod handle;
pub mod meta;
pub mod shard;

pub use handle::Hash;
pub use meta::{HashMeta, ShardMeta};
pub use shard::ShardRouter;
