//! Hash Tests
//!
//! These tests verify:
//! - Handle construction for missing, existing and foreign keys
//! - Field reads and writes
//! - Length accounting on unsharded hashes
//! - Destruction and GC hand-off
//! - Expiration bookkeeping

use std::collections::BTreeSet;

use hashkv::gc;
use hashkv::keys::item_key;
use hashkv::object::{ObjectEncoding, ObjectHeader, ObjectType};
use hashkv::{Config, Database, Hash, HashKvError, HashMeta, MemStore, Store, Transaction};
use proptest::prelude::*;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup() -> (Database, MemStore) {
    let db = Database::new(Config::builder().namespace("test").build()).unwrap();
    (db, MemStore::new())
}

fn seed(db: &Database, store: &MemStore, key: &[u8], pairs: &[(&str, &str)]) {
    let mut txn = store.begin().unwrap();
    let mut hash = Hash::open(db, &mut txn, key).unwrap();
    for (field, value) in pairs {
        hash.hset(field.as_bytes(), value.as_bytes()).unwrap();
    }
    txn.commit().unwrap();
}

// =============================================================================
// Construction Tests
// =============================================================================

#[test]
fn test_open_missing_hash_is_empty() {
    let (db, store) = setup();
    let mut txn = store.begin().unwrap();

    let hash = Hash::open(&db, &mut txn, b"missing").unwrap();
    assert!(!hash.exists());
    assert_eq!(hash.hlen().unwrap(), 0);
    assert!(hash.hgetall().unwrap().is_empty());
    assert_eq!(hash.meta().shard_count, 0);

    // Nothing is written until the first field is created
    assert_eq!(txn.pending_writes(), 0);
}

#[test]
fn test_open_uses_configured_shard_count() {
    let db = Database::new(Config::builder().default_shard_count(5).build()).unwrap();
    let store = MemStore::new();
    let mut txn = store.begin().unwrap();

    let hash = Hash::open(&db, &mut txn, b"k").unwrap();
    assert_eq!(hash.meta().shard_count, 5);
}

#[test]
fn test_open_existing_hash_across_transactions() {
    let (db, store) = setup();
    seed(&db, &store, b"user", &[("name", "ada"), ("lang", "rust")]);

    let mut txn = store.begin().unwrap();
    let hash = Hash::open(&db, &mut txn, b"user").unwrap();
    assert!(hash.exists());
    assert_eq!(hash.hlen().unwrap(), 2);
    assert_eq!(hash.hget(b"name").unwrap(), Some(b"ada".to_vec()));
}

#[test]
fn test_open_foreign_type_is_type_mismatch() {
    let (db, store) = setup();
    let mut txn = store.begin().unwrap();

    let mut row = ObjectHeader::new(ObjectType::List, ObjectEncoding::LinkedList).encode();
    row.extend_from_slice(&[0u8; 16]);
    txn.set(&db.meta_key(b"list"), &row).unwrap();

    let result = Hash::open(&db, &mut txn, b"list");
    assert!(matches!(result, Err(HashKvError::TypeMismatch)));
}

#[test]
fn test_open_malformed_meta_is_invalid_length() {
    let (db, store) = setup();
    let mut txn = store.begin().unwrap();
    txn.set(&db.meta_key(b"bad"), b"short").unwrap();

    let result = Hash::open(&db, &mut txn, b"bad");
    assert!(matches!(result, Err(HashKvError::InvalidLength { .. })));
}

// =============================================================================
// Read / Write Tests
// =============================================================================

#[test]
fn test_hset_creates_then_overwrites() {
    let (db, store) = setup();
    let mut txn = store.begin().unwrap();
    let mut hash = Hash::open(&db, &mut txn, b"h").unwrap();

    assert_eq!(hash.hset(b"f", b"v1").unwrap(), 1);
    assert_eq!(hash.hset(b"f", b"v2").unwrap(), 0);

    assert_eq!(hash.hlen().unwrap(), 1);
    assert_eq!(hash.meta().field_count, 1);
    assert_eq!(hash.hget(b"f").unwrap(), Some(b"v2".to_vec()));
}

#[test]
fn test_first_write_persists_meta() {
    let (db, store) = setup();
    seed(&db, &store, b"h", &[("f", "v")]);

    let raw = store.get(&db.meta_key(b"h")).unwrap();
    let meta = HashMeta::decode(&raw).unwrap();
    assert_eq!(meta.field_count, 1);
    assert_eq!(meta.header.kind, ObjectType::Hash);
}

#[test]
fn test_hget_distinguishes_empty_from_absent() {
    let (db, store) = setup();
    let mut txn = store.begin().unwrap();
    let mut hash = Hash::open(&db, &mut txn, b"h").unwrap();

    hash.hset(b"empty", b"").unwrap();
    assert_eq!(hash.hget(b"empty").unwrap(), Some(Vec::new()));
    assert_eq!(hash.hget(b"absent").unwrap(), None);
    assert!(hash.hexists(b"empty").unwrap());
    assert!(!hash.hexists(b"absent").unwrap());
}

#[test]
fn test_hsetnx_is_exclusive() {
    let (db, store) = setup();
    let mut txn = store.begin().unwrap();
    let mut hash = Hash::open(&db, &mut txn, b"h").unwrap();

    assert_eq!(hash.hsetnx(b"f", b"v1").unwrap(), 1);
    assert_eq!(hash.hsetnx(b"f", b"v2").unwrap(), 0);

    assert_eq!(hash.hget(b"f").unwrap(), Some(b"v1".to_vec()));
    assert_eq!(hash.hlen().unwrap(), 1);
}

#[test]
fn test_hincrby_accumulates() {
    let (db, store) = setup();
    let mut txn = store.begin().unwrap();
    let mut hash = Hash::open(&db, &mut txn, b"h").unwrap();

    assert_eq!(hash.hincrby(b"n", 5).unwrap(), 5);
    assert_eq!(hash.hincrby(b"n", -2).unwrap(), 3);

    assert_eq!(hash.hget(b"n").unwrap(), Some(b"3".to_vec()));
    assert_eq!(hash.hlen().unwrap(), 1);
}

#[test]
fn test_hincrby_on_non_number_fails_without_write() {
    let (db, store) = setup();
    let mut txn = store.begin().unwrap();
    let mut hash = Hash::open(&db, &mut txn, b"h").unwrap();

    hash.hset(b"f", b"abc").unwrap();
    let result = hash.hincrby(b"f", 1);

    assert!(matches!(result, Err(HashKvError::NotANumber(_))));
    assert_eq!(hash.hget(b"f").unwrap(), Some(b"abc".to_vec()));
    assert_eq!(hash.hlen().unwrap(), 1);
}

#[test]
fn test_hincrby_overflow() {
    let (db, store) = setup();
    let mut txn = store.begin().unwrap();
    let mut hash = Hash::open(&db, &mut txn, b"h").unwrap();

    hash.hincrby(b"n", i64::MAX).unwrap();
    assert!(matches!(hash.hincrby(b"n", 1), Err(HashKvError::Overflow)));
    assert_eq!(hash.hget(b"n").unwrap(), Some(i64::MAX.to_string().into_bytes()));
}

#[test]
fn test_hincrbyfloat() {
    let (db, store) = setup();
    let mut txn = store.begin().unwrap();
    let mut hash = Hash::open(&db, &mut txn, b"h").unwrap();

    assert_eq!(hash.hincrbyfloat(b"x", 1.5).unwrap(), 1.5);
    assert_eq!(hash.hincrbyfloat(b"x", 2.25).unwrap(), 3.75);
    assert_eq!(hash.hget(b"x").unwrap(), Some(b"3.75".to_vec()));

    assert_eq!(hash.hincrbyfloat(b"x", 0.25).unwrap(), 4.0);
    assert_eq!(hash.hget(b"x").unwrap(), Some(b"4".to_vec()));
    assert_eq!(hash.hlen().unwrap(), 1);
}

#[test]
fn test_hincrbyfloat_rejects_bad_values() {
    let (db, store) = setup();
    let mut txn = store.begin().unwrap();
    let mut hash = Hash::open(&db, &mut txn, b"h").unwrap();

    hash.hset(b"s", b"not a float").unwrap();
    assert!(matches!(hash.hincrbyfloat(b"s", 1.0), Err(HashKvError::NotANumber(_))));
    assert!(matches!(
        hash.hincrbyfloat(b"other", f64::NAN),
        Err(HashKvError::NotANumber(_))
    ));
    assert!(!hash.hexists(b"other").unwrap());
}

#[test]
fn test_hmset_then_hmget() {
    let (db, store) = setup();
    let mut txn = store.begin().unwrap();
    let mut hash = Hash::open(&db, &mut txn, b"h").unwrap();

    hash.hset(b"a", b"old").unwrap();
    hash.hmset(&["a", "b", "c"], &["1", "2", "3"]).unwrap();

    // Only b and c were new
    assert_eq!(hash.meta().field_count, 3);
    assert_eq!(
        hash.hmget(&["c", "missing", "a", "b"]).unwrap(),
        vec![
            Some(b"3".to_vec()),
            None,
            Some(b"1".to_vec()),
            Some(b"2".to_vec())
        ]
    );
}

#[test]
fn test_hmset_duplicate_fields_count_once() {
    let (db, store) = setup();
    let mut txn = store.begin().unwrap();
    let mut hash = Hash::open(&db, &mut txn, b"h").unwrap();

    hash.hmset(&["a", "a"], &["1", "2"]).unwrap();
    assert_eq!(hash.hlen().unwrap(), 1);
    assert_eq!(hash.hget(b"a").unwrap(), Some(b"2".to_vec()));
}

#[test]
fn test_hmset_length_mismatch() {
    let (db, store) = setup();
    let mut txn = store.begin().unwrap();
    let mut hash = Hash::open(&db, &mut txn, b"h").unwrap();

    let result = hash.hmset(&["a", "b"], &["1"]);
    assert!(matches!(result, Err(HashKvError::InvalidArgument(_))));
    assert!(!hash.exists());
}

#[test]
fn test_hgetall_returns_fields_in_order() {
    let (db, store) = setup();
    seed(&db, &store, b"h", &[("b", "2"), ("a", "1"), ("c", "3")]);
    seed(&db, &store, b"other", &[("z", "26")]);

    let mut txn = store.begin().unwrap();
    let hash = Hash::open(&db, &mut txn, b"h").unwrap();
    assert_eq!(
        hash.hgetall().unwrap(),
        vec![
            (b"a".to_vec(), b"1".to_vec()),
            (b"b".to_vec(), b"2".to_vec()),
            (b"c".to_vec(), b"3".to_vec()),
        ]
    );
}

#[test]
fn test_hgetall_stops_at_declared_length() {
    let (db, store) = setup();
    seed(&db, &store, b"h", &[("a", "1"), ("b", "2")]);

    let mut txn = store.begin().unwrap();
    let id = Hash::open(&db, &mut txn, b"h").unwrap().meta().header.id;
    // A row under the field prefix that the count does not include
    txn.set(&item_key(&db.data_key(&id), b"c"), b"3").unwrap();

    let hash = Hash::open(&db, &mut txn, b"h").unwrap();
    assert_eq!(hash.hlen().unwrap(), 2);
    assert_eq!(
        hash.hgetall().unwrap(),
        vec![(b"a".to_vec(), b"1".to_vec()), (b"b".to_vec(), b"2".to_vec())]
    );
}

// =============================================================================
// Deletion Tests
// =============================================================================

#[test]
fn test_hdel_partial() {
    let (db, store) = setup();
    seed(&db, &store, b"h", &[("a", "1"), ("b", "2"), ("c", "3")]);

    let mut txn = store.begin().unwrap();
    let mut hash = Hash::open(&db, &mut txn, b"h").unwrap();

    assert_eq!(hash.hdel(&["a", "missing", "a"]).unwrap(), 1);
    assert_eq!(hash.hlen().unwrap(), 2);
    assert!(!hash.hexists(b"a").unwrap());
    assert!(hash.exists());
}

#[test]
fn test_hdel_nothing_writes_nothing() {
    let (db, store) = setup();
    seed(&db, &store, b"h", &[("a", "1")]);

    let mut txn = store.begin().unwrap();
    let mut hash = Hash::open(&db, &mut txn, b"h").unwrap();
    assert_eq!(hash.hdel(&["x", "y"]).unwrap(), 0);
    assert_eq!(txn.pending_writes(), 0);

    let mut txn = store.begin().unwrap();
    let mut empty = Hash::open(&db, &mut txn, b"never").unwrap();
    assert_eq!(empty.hdel(&["x"]).unwrap(), 0);
    assert_eq!(txn.pending_writes(), 0);
}

#[test]
fn test_hdel_last_fields_destroys_hash() {
    let (db, store) = setup();
    seed(&db, &store, b"h", &[("a", "1"), ("b", "2")]);
    let old_meta = HashMeta::decode(&store.get(&db.meta_key(b"h")).unwrap()).unwrap();

    let mut txn = store.begin().unwrap();
    let mut hash = Hash::open(&db, &mut txn, b"h").unwrap();
    assert_eq!(hash.hdel(&["a", "b", "c"]).unwrap(), 2);
    assert!(!hash.exists());
    txn.commit().unwrap();

    assert_eq!(store.get(&db.meta_key(b"h")), None);
    assert!(store
        .get(&db.gc_key(&db.data_key(&old_meta.header.id)))
        .is_some());

    let mut txn = store.begin().unwrap();
    let hash = Hash::open(&db, &mut txn, b"h").unwrap();
    assert_eq!(hash.hlen().unwrap(), 0);
    assert!(hash.hgetall().unwrap().is_empty());
    assert_ne!(hash.meta().header.id, old_meta.header.id);
}

#[test]
fn test_destroy_hands_range_to_gc() {
    let (db, store) = setup();
    seed(&db, &store, b"h", &[("a", "1"), ("b", "2"), ("c", "3")]);
    let id = HashMeta::decode(&store.get(&db.meta_key(b"h")).unwrap())
        .unwrap()
        .header
        .id;

    let mut txn = store.begin().unwrap();
    Hash::open(&db, &mut txn, b"h").unwrap().destroy().unwrap();
    txn.commit().unwrap();

    // Rows survive until a sweep runs
    assert_eq!(store.scan_prefix(&db.data_key(&id)).len(), 3);

    let mut txn = store.begin().unwrap();
    assert_eq!(gc::sweep(&mut txn, &db, 100).unwrap(), 3);
    txn.commit().unwrap();

    assert!(store.scan_prefix(&db.data_key(&id)).is_empty());
    assert!(store.scan_prefix(&db.gc_prefix()).is_empty());
}

#[test]
fn test_handle_is_usable_after_destroy() {
    let (db, store) = setup();
    let mut txn = store.begin().unwrap();
    let mut hash = Hash::open(&db, &mut txn, b"h").unwrap();

    hash.hset(b"a", b"1").unwrap();
    hash.destroy().unwrap();
    assert_eq!(hash.hget(b"a").unwrap(), None);

    assert_eq!(hash.hset(b"b", b"2").unwrap(), 1);
    assert_eq!(hash.hlen().unwrap(), 1);
    assert_eq!(hash.hgetall().unwrap(), vec![(b"b".to_vec(), b"2".to_vec())]);
}

#[test]
fn test_destroy_missing_hash_writes_nothing() {
    let (db, store) = setup();
    let mut txn = store.begin().unwrap();
    let mut hash = Hash::open(&db, &mut txn, b"none").unwrap();

    hash.destroy().unwrap();
    assert!(!hash.exists());
    assert_eq!(txn.pending_writes(), 0);
}

// =============================================================================
// Expiration Tests
// =============================================================================

#[test]
fn test_expire_and_persist() {
    let (db, store) = setup();
    seed(&db, &store, b"h", &[("a", "1")]);
    let meta_key = db.meta_key(b"h");

    let mut txn = store.begin().unwrap();
    let mut hash = Hash::open(&db, &mut txn, b"h").unwrap();
    assert!(hash.expire(1_000).unwrap());
    assert!(hash.expire(2_000).unwrap());
    assert_eq!(hash.expire_at(), Some(2_000));
    txn.commit().unwrap();

    assert_eq!(store.get(&db.expire_key(1_000, &meta_key)), None);
    assert!(store.get(&db.expire_key(2_000, &meta_key)).is_some());

    let mut txn = store.begin().unwrap();
    let mut hash = Hash::open(&db, &mut txn, b"h").unwrap();
    assert_eq!(hash.expire_at(), Some(2_000));
    assert!(hash.persist().unwrap());
    assert!(!hash.persist().unwrap());
    txn.commit().unwrap();

    assert!(store.scan_prefix(&db.expire_prefix()).is_empty());
}

#[test]
fn test_expire_missing_hash() {
    let (db, store) = setup();
    let mut txn = store.begin().unwrap();
    let mut hash = Hash::open(&db, &mut txn, b"none").unwrap();

    assert!(!hash.expire(1_000).unwrap());
    assert!(matches!(hash.expire(0), Err(HashKvError::InvalidArgument(_))));
    assert_eq!(txn.pending_writes(), 0);
}

#[test]
fn test_destroy_deregisters_expiration() {
    let (db, store) = setup();
    seed(&db, &store, b"h", &[("a", "1")]);

    let mut txn = store.begin().unwrap();
    let mut hash = Hash::open(&db, &mut txn, b"h").unwrap();
    hash.expire(5_000).unwrap();
    hash.hdel(&["a"]).unwrap();
    txn.commit().unwrap();

    assert!(store.scan_prefix(&db.expire_prefix()).is_empty());
    assert_eq!(store.get(&db.meta_key(b"h")), None);
}

// =============================================================================
// Length Invariant
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Set(u8),
    SetNx(u8),
    Incr(u8),
    IncrFloat(u8),
    MSet(Vec<u8>),
    Del(Vec<u8>),
}

fn field(n: u8) -> Vec<u8> {
    format!("f{}", n).into_bytes()
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let f = 0u8..8;
    prop_oneof![
        f.clone().prop_map(Op::Set),
        f.clone().prop_map(Op::SetNx),
        f.clone().prop_map(Op::Incr),
        f.clone().prop_map(Op::IncrFloat),
        prop::collection::vec(f.clone(), 1..5).prop_map(Op::MSet),
        prop::collection::vec(f, 1..5).prop_map(Op::Del),
    ]
}

proptest! {
    #[test]
    fn prop_hlen_matches_existing_fields(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let (db, store) = setup();
        let mut live = BTreeSet::new();

        for op in ops {
            let mut txn = store.begin().unwrap();
            let mut hash = Hash::open(&db, &mut txn, b"h").unwrap();
            match op {
                Op::Set(n) => { hash.hset(&field(n), b"1").unwrap(); live.insert(n); }
                Op::SetNx(n) => { hash.hsetnx(&field(n), b"1").unwrap(); live.insert(n); }
                Op::Incr(n) => {
                    // Float increments can leave a non-integer behind
                    match hash.hincrby(&field(n), 1) {
                        Ok(_) => { live.insert(n); }
                        Err(e) => prop_assert!(matches!(e, HashKvError::NotANumber(_))),
                    }
                }
                Op::IncrFloat(n) => { hash.hincrbyfloat(&field(n), 0.5).unwrap(); live.insert(n); }
                Op::MSet(ns) => {
                    let fields: Vec<Vec<u8>> = ns.iter().map(|&n| field(n)).collect();
                    let values = vec![b"1".to_vec(); fields.len()];
                    hash.hmset(&fields, &values).unwrap();
                    live.extend(ns);
                }
                Op::Del(ns) => {
                    let fields: Vec<Vec<u8>> = ns.iter().map(|&n| field(n)).collect();
                    let expected = ns.iter().collect::<BTreeSet<_>>()
                        .into_iter()
                        .filter(|n| live.contains(*n))
                        .count() as i64;
                    prop_assert_eq!(hash.hdel(&fields).unwrap(), expected);
                    for n in &ns { live.remove(n); }
                }
            }
            txn.commit().unwrap();

            let mut txn = store.begin().unwrap();
            let hash = Hash::open(&db, &mut txn, b"h").unwrap();
            let existing = (0u8..8).filter(|&n| hash.hexists(&field(n)).unwrap()).count() as i64;
            prop_assert_eq!(hash.hlen().unwrap(), existing);
            prop_assert_eq!(existing, live.len() as i64);
            prop_assert_eq!(hash.exists(), !live.is_empty());
        }
    }
}
