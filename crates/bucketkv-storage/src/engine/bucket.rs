//! Bucket handles resolved within a transaction.

use std::ops::Bound;

use super::{StorageError, StorageResult, Transaction};

/// A bucket resolved within one transaction.
///
/// The handle borrows the transaction mutably, so it can only be used for the
/// span of a single operation; resolve it again (or [`bind`](Self::bind) a
/// name checked earlier in the same transaction) for the next one.
pub struct Bucket<'t, T> {
    tx: &'t mut T,
    name: &'t str,
}

impl<'t, T: Transaction> Bucket<'t, T> {
    /// Resolve `name` in the transaction's view.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BucketNotFound`] if the bucket does not exist.
    pub fn resolve(tx: &'t mut T, name: &'t str) -> StorageResult<Self> {
        if !tx.has_bucket(name)? {
            return Err(StorageError::BucketNotFound(name.to_string()));
        }
        Ok(Self { tx, name })
    }

    /// Bind a bucket that was already resolved earlier in the same transaction.
    ///
    /// Buckets cannot disappear from a transaction's own view unless the
    /// transaction drops them, so the existence check is skipped.
    pub fn bind(tx: &'t mut T, name: &'t str) -> Self {
        Self { tx, name }
    }

    /// The bucket name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name
    }

    /// Whether the underlying transaction is read-only.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.tx.is_read_only()
    }

    /// Get an owned copy of the value stored at `key`.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.tx.get(self.name, key)
    }

    /// Insert or replace the value at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadOnly`] in a read-only transaction.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.tx.put(self.name, key, value)
    }

    /// Delete `key`, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadOnly`] in a read-only transaction.
    pub fn delete(&mut self, key: &[u8]) -> StorageResult<bool> {
        self.tx.delete(self.name, key)
    }

    /// Open a cursor over the bucket.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn cursor(&self) -> StorageResult<T::Cursor<'_>> {
        self.tx.cursor(self.name)
    }

    /// Read up to `limit` keys starting at `from`, without their values.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub fn keys(&self, from: Bound<&[u8]>, limit: usize) -> StorageResult<Vec<Vec<u8>>> {
        self.tx.keys(self.name, from, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::RedbEngine;
    use crate::engine::{Cursor, StorageEngine};

    #[test]
    fn test_resolve_missing_bucket() {
        let engine = RedbEngine::in_memory().expect("failed to create engine");
        let mut tx = engine.begin_read().expect("failed to begin read");

        let err = Bucket::resolve(&mut tx, "missing").err().expect("bucket should be missing");
        assert!(err.is_bucket_not_found());
    }

    #[test]
    fn test_bucket_operations() {
        let engine = RedbEngine::in_memory().expect("failed to create engine");
        engine.create_bucket("things").expect("failed to create bucket");

        let mut tx = engine.begin_write().expect("failed to begin write");
        {
            let mut bucket = Bucket::resolve(&mut tx, "things").expect("failed to resolve");
            assert_eq!(bucket.name(), "things");
            assert!(!bucket.is_read_only());

            bucket.put(b"b", b"2").expect("failed to put");
            bucket.put(b"a", b"1").expect("failed to put");
            assert_eq!(bucket.get(b"a").expect("failed to get"), Some(b"1".to_vec()));
            assert!(bucket.delete(b"a").expect("failed to delete"));
            assert!(!bucket.delete(b"a").expect("failed to delete"));

            let mut cursor = bucket.cursor().expect("failed to open cursor");
            let first = cursor.seek_first().expect("failed to seek");
            assert_eq!(first, Some((b"b".to_vec(), b"2".to_vec())));
            drop(cursor);

            bucket.put(b"c", b"3").expect("failed to put");
            let keys = bucket.keys(Bound::Excluded(&b"b"[..]), 10).expect("failed to page keys");
            assert_eq!(keys, vec![b"c".to_vec()]);
        }
        tx.commit().expect("failed to commit");
    }
}
