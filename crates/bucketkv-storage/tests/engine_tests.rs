//! Tests for storage engine traits.
//!
//! These tests validate the trait contracts and can be used to test
//! any storage engine implementation.

use std::ops::Bound;

use bucketkv_storage::{Bucket, Cursor, StorageEngine, StorageError, StorageResult, Transaction};

/// The bucket every compliance test works in.
pub const BUCKET: &str = "test_bucket";

/// A test harness trait for testing storage engine implementations.
pub trait TestHarness {
    /// The storage engine type being tested.
    type Engine: StorageEngine;

    /// Create a new storage engine for testing.
    fn create_engine() -> StorageResult<Self::Engine>;

    /// Clean up after tests (remove temp files, etc.).
    fn cleanup(_engine: Self::Engine) {}
}

/// Create an engine with [`BUCKET`] in place.
fn engine_with_bucket<H: TestHarness>() -> H::Engine {
    let engine = H::create_engine().expect("failed to create engine");
    engine.create_bucket(BUCKET).expect("failed to create bucket");
    engine
}

/// Run the standard test suite against a storage engine.
///
/// ```ignore
/// struct RedbHarness;
///
/// impl TestHarness for RedbHarness {
///     type Engine = RedbEngine;
///
///     fn create_engine() -> StorageResult<Self::Engine> {
///         RedbEngine::in_memory()
///     }
/// }
///
/// #[test]
/// fn test_redb_compliance() {
///     run_test_suite::<RedbHarness>();
/// }
/// ```
pub fn run_test_suite<H: TestHarness>() {
    test_basic_operations::<H>();
    test_transaction_isolation::<H>();
    test_cursor_operations::<H>();
    test_key_paging::<H>();
    test_missing_bucket::<H>();
    test_read_only_enforcement::<H>();
}

/// Test basic get/put/delete operations.
fn test_basic_operations<H: TestHarness>() {
    let engine = engine_with_bucket::<H>();

    {
        let mut tx = engine.begin_write().expect("failed to begin write");
        tx.put(BUCKET, b"key1", b"value1").expect("failed to put");
        tx.commit().expect("failed to commit");
    }

    {
        let tx = engine.begin_read().expect("failed to begin read");
        let value = tx.get(BUCKET, b"key1").expect("failed to get");
        assert_eq!(value, Some(b"value1".to_vec()));
    }

    {
        let mut tx = engine.begin_write().expect("failed to begin write");
        tx.put(BUCKET, b"key1", b"value1_updated").expect("failed to put");
        tx.commit().expect("failed to commit");
    }

    {
        let tx = engine.begin_read().expect("failed to begin read");
        let value = tx.get(BUCKET, b"key1").expect("failed to get");
        assert_eq!(value, Some(b"value1_updated".to_vec()));
    }

    {
        let mut tx = engine.begin_write().expect("failed to begin write");
        let deleted = tx.delete(BUCKET, b"key1").expect("failed to delete");
        assert!(deleted);
        tx.commit().expect("failed to commit");
    }

    {
        let tx = engine.begin_read().expect("failed to begin read");
        let value = tx.get(BUCKET, b"key1").expect("failed to get");
        assert_eq!(value, None);
    }

    // Deleting an absent key reports false rather than failing
    {
        let mut tx = engine.begin_write().expect("failed to begin write");
        let deleted = tx.delete(BUCKET, b"nonexistent").expect("failed to delete");
        assert!(!deleted);
        tx.rollback().expect("failed to rollback");
    }

    H::cleanup(engine);
}

/// Test that a reader keeps its snapshot while a writer commits.
fn test_transaction_isolation<H: TestHarness>() {
    let engine = engine_with_bucket::<H>();

    {
        let mut tx = engine.begin_write().expect("failed to begin write");
        tx.put(BUCKET, b"key1", b"initial").expect("failed to put");
        tx.commit().expect("failed to commit");
    }

    {
        let read_tx = engine.begin_read().expect("failed to begin read");

        let mut write_tx = engine.begin_write().expect("failed to begin write");
        write_tx.put(BUCKET, b"key1", b"updated").expect("failed to put");

        // Uncommitted writes are visible inside their own transaction only
        let own = write_tx.get(BUCKET, b"key1").expect("failed to get");
        assert_eq!(own, Some(b"updated".to_vec()));
        let snapshot = read_tx.get(BUCKET, b"key1").expect("failed to get");
        assert_eq!(snapshot, Some(b"initial".to_vec()));

        write_tx.commit().expect("failed to commit");

        let snapshot = read_tx.get(BUCKET, b"key1").expect("failed to get");
        assert_eq!(snapshot, Some(b"initial".to_vec()));
    }

    {
        let read_tx = engine.begin_read().expect("failed to begin read");
        let value = read_tx.get(BUCKET, b"key1").expect("failed to get");
        assert_eq!(value, Some(b"updated".to_vec()));
    }

    H::cleanup(engine);
}

/// Test cursor operations: seek_first, next, seek, current.
fn test_cursor_operations<H: TestHarness>() {
    let engine = engine_with_bucket::<H>();

    {
        let mut tx = engine.begin_write().expect("failed to begin write");
        // Inserted out of order on purpose
        for (k, v) in [(b"c", b"3"), (b"a", b"1"), (b"e", b"5"), (b"b", b"2"), (b"d", b"4")] {
            tx.put(BUCKET, k, v).expect("failed to put");
        }
        tx.commit().expect("failed to commit");
    }

    {
        let tx = engine.begin_read().expect("failed to begin read");
        let mut cursor = tx.cursor(BUCKET).expect("failed to create cursor");

        assert_eq!(cursor.current(), None);

        let first = cursor.seek_first().expect("failed to seek_first");
        assert_eq!(first, Some((b"a".to_vec(), b"1".to_vec())));

        let second = cursor.next().expect("failed to next");
        assert_eq!(second, Some((b"b".to_vec(), b"2".to_vec())));
        assert_eq!(cursor.current(), Some((b"b".as_slice(), b"2".as_slice())));

        let c = cursor.seek(b"c").expect("failed to seek");
        assert_eq!(c, Some((b"c".to_vec(), b"3".to_vec())));

        // Seeking between keys lands on the next greater key
        let d = cursor.seek(b"cc").expect("failed to seek");
        assert_eq!(d, Some((b"d".to_vec(), b"4".to_vec())));

        let e = cursor.next().expect("failed to next");
        assert_eq!(e, Some((b"e".to_vec(), b"5".to_vec())));
        let past_end = cursor.next().expect("failed to next");
        assert_eq!(past_end, None);
        assert_eq!(cursor.current(), None);

        let beyond = cursor.seek(b"z").expect("failed to seek");
        assert_eq!(beyond, None);
    }

    // An unpositioned cursor starts from the first key
    {
        let tx = engine.begin_read().expect("failed to begin read");
        let mut cursor = tx.cursor(BUCKET).expect("failed to create cursor");

        let mut keys = Vec::new();
        while let Some((k, _)) = cursor.next().expect("failed to next") {
            keys.push(k);
        }
        let expected: Vec<Vec<u8>> = [b"a", b"b", b"c", b"d", b"e"].map(|k| k.to_vec()).into();
        assert_eq!(keys, expected);
    }

    H::cleanup(engine);
}

/// Test paging through keys with `Transaction::keys`.
fn test_key_paging<H: TestHarness>() {
    let engine = engine_with_bucket::<H>();

    let mut tx = engine.begin_write().expect("failed to begin write");
    for key in ["k1", "k2", "k3", "k4", "k5"] {
        tx.put(BUCKET, key.as_bytes(), &[0u8; 4096]).expect("failed to put");
    }

    // Pages resume after the last key even with writes in between
    let first = tx.keys(BUCKET, Bound::Unbounded, 2).expect("failed to page");
    assert_eq!(first, vec![b"k1".to_vec(), b"k2".to_vec()]);
    tx.delete(BUCKET, b"k3").expect("failed to delete");
    tx.put(BUCKET, b"k6", b"").expect("failed to put");

    let mut seen = first;
    loop {
        let after = seen.last().cloned().expect("at least one key");
        let page = tx.keys(BUCKET, Bound::Excluded(after.as_slice()), 2).expect("failed to page");
        if page.is_empty() {
            break;
        }
        seen.extend(page);
    }
    let expected: Vec<Vec<u8>> =
        ["k1", "k2", "k4", "k5", "k6"].map(|k| k.as_bytes().to_vec()).into();
    assert_eq!(seen, expected);

    let from = tx.keys(BUCKET, Bound::Included(&b"k4"[..]), 10).expect("failed to page");
    assert_eq!(from.len(), 3);

    let err = tx.keys("missing", Bound::Unbounded, 10).expect_err("missing bucket should fail");
    assert!(err.is_bucket_not_found());
    tx.rollback().expect("failed to rollback");

    H::cleanup(engine);
}

/// Test that missing buckets are reported and never created implicitly.
fn test_missing_bucket<H: TestHarness>() {
    let engine = H::create_engine().expect("failed to create engine");

    {
        let tx = engine.begin_read().expect("failed to begin read");
        assert!(!tx.has_bucket("missing").expect("failed to check bucket"));
        assert!(matches!(tx.get("missing", b"k"), Err(StorageError::BucketNotFound(_))));
        assert!(matches!(tx.cursor("missing"), Err(StorageError::BucketNotFound(_))));
    }

    {
        let mut tx = engine.begin_write().expect("failed to begin write");
        assert!(matches!(tx.put("missing", b"k", b"v"), Err(StorageError::BucketNotFound(_))));
        assert!(matches!(tx.delete("missing", b"k"), Err(StorageError::BucketNotFound(_))));
        assert!(Bucket::resolve(&mut tx, "missing").is_err());
        tx.commit().expect("failed to commit");
    }

    assert!(engine.list_buckets().expect("failed to list").is_empty());

    H::cleanup(engine);
}

/// Test that read-only transactions reject write operations.
fn test_read_only_enforcement<H: TestHarness>() {
    let engine = engine_with_bucket::<H>();

    {
        let mut tx = engine.begin_read().expect("failed to begin read");
        assert!(tx.is_read_only());
        assert!(matches!(tx.put(BUCKET, b"k", b"v"), Err(StorageError::ReadOnly)));
        assert!(matches!(tx.delete(BUCKET, b"k"), Err(StorageError::ReadOnly)));
    }

    {
        let tx = engine.begin(true).expect("failed to begin write");
        assert!(!tx.is_read_only());
        tx.rollback().expect("failed to rollback");
    }

    H::cleanup(engine);
}

/// Test error types are properly constructed and implement Error trait.
#[test]
fn test_error_types() {
    fn assert_error<E: std::error::Error + Send + Sync + 'static>() {}
    assert_error::<StorageError>();

    let open_err = StorageError::Open("test".to_string());
    assert!(open_err.to_string().contains("test"));
    assert!(!open_err.is_bucket_not_found());

    let missing = StorageError::BucketNotFound("users".to_string());
    assert!(missing.is_bucket_not_found());
    assert!(missing.to_string().contains("users"));

    assert!(StorageError::ReadOnly.to_string().contains("read-only"));
}
