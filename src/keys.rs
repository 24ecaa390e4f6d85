//! Key scheme
//!
//! Every row hashkv writes lives under the configured namespace. User keys
//! only appear in meta keys; everything a value owns is keyed by its
//! immutable object id, so renaming or recreating a key never aliases old
//! data.
//!
//! ## Layout
//! ```text
//! meta key   {ns}:{db}:M:{user key}
//! data key   {ns}:{db}:D:{object id}
//! item key   {data key}:{field}
//! shard key  {ns}:{db}:S:{object id}{shard index, BE i64}
//! gc marker  {ns}:sys:gc:{key prefix}
//! expiry     {ns}:sys:at:{expire at, BE i64}{meta key}
//! ```

use crate::config::Config;
use crate::error::Result;
use crate::object::ObjectId;

/// Separator between key components
pub const SEPARATOR: u8 = b':';

const META_TAG: &str = "M";
const DATA_TAG: &str = "D";
const SHARD_TAG: &str = "S";
const GC_TAG: &str = "gc";
const EXPIRE_TAG: &str = "at";

/// A logical database: one namespace + db index, plus its configuration
#[derive(Debug, Clone)]
pub struct Database {
    config: Config,
}

impl Database {
    /// Validate the config and build the keyspace on top of it
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// `{ns}:{db}:{tag}:`
    fn db_prefix(&self, tag: &str) -> Vec<u8> {
        format!("{}:{}:{}:", self.config.namespace, self.config.db_id, tag).into_bytes()
    }

    /// `{ns}:sys:{tag}:`
    fn sys_prefix(&self, tag: &str) -> Vec<u8> {
        format!("{}:sys:{}:", self.config.namespace, tag).into_bytes()
    }

    /// Key holding the metadata row for a user key
    pub fn meta_key(&self, key: &[u8]) -> Vec<u8> {
        let mut buf = self.db_prefix(META_TAG);
        buf.extend_from_slice(key);
        buf
    }

    /// Recover the user key from a meta key of this database
    pub fn user_key<'k>(&self, meta_key: &'k [u8]) -> Option<&'k [u8]> {
        meta_key.strip_prefix(self.db_prefix(META_TAG).as_slice())
    }

    /// Prefix under which every entry of an object is stored
    pub fn data_key(&self, id: &ObjectId) -> Vec<u8> {
        let mut buf = self.db_prefix(DATA_TAG);
        buf.extend_from_slice(id.as_bytes());
        buf
    }

    /// Prefix shared by every shard row of an object
    pub fn shard_prefix(&self, id: &ObjectId) -> Vec<u8> {
        let mut buf = self.db_prefix(SHARD_TAG);
        buf.extend_from_slice(id.as_bytes());
        buf
    }

    /// Key of one shard row
    pub fn shard_key(&self, id: &ObjectId, index: i64) -> Vec<u8> {
        let mut buf = self.shard_prefix(id);
        buf.extend_from_slice(&index.to_be_bytes());
        buf
    }

    /// Prefix of every GC marker in the namespace
    pub fn gc_prefix(&self) -> Vec<u8> {
        self.sys_prefix(GC_TAG)
    }

    /// Marker row for a key range awaiting collection
    pub fn gc_key(&self, range_prefix: &[u8]) -> Vec<u8> {
        let mut buf = self.gc_prefix();
        buf.extend_from_slice(range_prefix);
        buf
    }

    /// Prefix of the expiration index
    pub fn expire_prefix(&self) -> Vec<u8> {
        self.sys_prefix(EXPIRE_TAG)
    }

    /// Expiration index entry, ordered by `expire_at`
    pub fn expire_key(&self, expire_at: i64, meta_key: &[u8]) -> Vec<u8> {
        let mut buf = self.expire_prefix();
        buf.extend_from_slice(&expire_at.to_be_bytes());
        buf.extend_from_slice(meta_key);
        buf
    }
}

/// Prefix of every item key under a data key
pub fn item_prefix(data_key: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(data_key.len() + 1);
    buf.extend_from_slice(data_key);
    buf.push(SEPARATOR);
    buf
}

/// Key of one field
pub fn item_key(data_key: &[u8], field: &[u8]) -> Vec<u8> {
    let mut buf = item_prefix(data_key);
    buf.extend_from_slice(field);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::new(Config::builder().namespace("ns").db_id(2).build()).unwrap()
    }

    #[test]
    fn test_meta_key_layout() {
        assert_eq!(db().meta_key(b"user"), b"ns:2:M:user".to_vec());
    }

    #[test]
    fn test_user_key_inverts_meta_key() {
        let db = db();
        let meta_key = db.meta_key(b"user");
        assert_eq!(db.user_key(&meta_key), Some(b"user".as_slice()));
        assert_eq!(db.user_key(b"ns:9:M:user"), None);
    }

    #[test]
    fn test_item_key_layout() {
        let id = ObjectId::from_bytes([1u8; 16]);
        let data_key = db().data_key(&id);

        let mut expected = b"ns:2:D:".to_vec();
        expected.extend_from_slice(&[1u8; 16]);
        assert_eq!(data_key, expected);

        expected.extend_from_slice(b":field");
        assert_eq!(item_key(&data_key, b"field"), expected);
        assert!(item_key(&data_key, b"field").starts_with(&item_prefix(&data_key)));
    }

    #[test]
    fn test_shard_key_layout() {
        let id = ObjectId::from_bytes([9u8; 16]);
        let key = db().shard_key(&id, 3);

        assert!(key.starts_with(&db().shard_prefix(&id)));
        assert_eq!(&key[key.len() - 8..], &3i64.to_be_bytes());
        // Shard rows never fall under the item prefix
        assert!(!key.starts_with(&item_prefix(&db().data_key(&id))));
    }

    #[test]
    fn test_system_keys() {
        let db = db();
        assert!(db.gc_key(b"range").starts_with(b"ns:sys:gc:"));
        let expire = db.expire_key(42, b"ns:2:M:k");
        assert!(expire.starts_with(&db.expire_prefix()));
        assert!(expire.ends_with(b"ns:2:M:k"));
    }

    #[test]
    fn test_databases_do_not_share_keys() {
        let other = Database::new(Config::builder().namespace("ns").db_id(3).build()).unwrap();
        assert_ne!(db().meta_key(b"k"), other.meta_key(b"k"));
    }
}
