//! Core storage engine traits.
//!
//! This module defines the fundamental traits for storage backends:
//!
//! - [`StorageEngine`] - Entry point for transactions and bucket administration
//! - [`Transaction`] - ACID transaction with bucket-scoped reads, writes and key paging
//! - [`Cursor`] - Ordered iteration over the key-value pairs of one bucket

use std::ops::Bound;
use std::sync::Arc;

use super::StorageResult;

/// A key-value pair returned by cursor operations.
pub type KeyValue = (Vec<u8>, Vec<u8>);

/// Result type for cursor operations that return a key-value pair.
pub type CursorResult = StorageResult<Option<KeyValue>>;

/// A storage engine that provides transactional access to named buckets.
///
/// Implementations must be thread-safe (`Send + Sync`). At most one write
/// transaction is active at a time; beginning a second one blocks until the
/// first is committed or aborted. Read transactions run concurrently with
/// each other and with the active writer, each seeing a snapshot.
///
/// Transactions own their state rather than borrowing the engine, so they
/// can be handed to a worker thread that outlives the call which began them.
///
/// # Example
///
/// ```ignore
/// use bucketkv_storage::{StorageEngine, Transaction};
///
/// fn example<E: StorageEngine>(engine: &E) -> StorageResult<()> {
///     engine.create_bucket("users")?;
///
///     let mut tx = engine.begin_write()?;
///     tx.put("users", b"user:1", b"Alice")?;
///     tx.commit()?;
///
///     let tx = engine.begin_read()?;
///     assert_eq!(tx.get("users", b"user:1")?, Some(b"Alice".to_vec()));
///     Ok(())
/// }
/// ```
pub trait StorageEngine: Send + Sync {
    /// The transaction type for this engine.
    type Transaction: Transaction + 'static;

    /// Begin a read-only transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Transaction`](super::StorageError::Transaction)
    /// if the transaction cannot be started.
    fn begin_read(&self) -> StorageResult<Self::Transaction>;

    /// Begin a read-write transaction, waiting for any active writer.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Transaction`](super::StorageError::Transaction)
    /// if the transaction cannot be started.
    fn begin_write(&self) -> StorageResult<Self::Transaction>;

    /// Begin a transaction in the requested mode.
    ///
    /// # Errors
    ///
    /// See [`begin_read`](Self::begin_read) and [`begin_write`](Self::begin_write).
    fn begin(&self, writable: bool) -> StorageResult<Self::Transaction> {
        if writable {
            self.begin_write()
        } else {
            self.begin_read()
        }
    }

    /// Create a bucket if it does not exist yet.
    ///
    /// Returns `true` if the bucket was created, `false` if it already existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the administrative write transaction fails.
    fn create_bucket(&self, name: &str) -> StorageResult<bool>;

    /// Drop a bucket and every key in it.
    ///
    /// Returns `true` if the bucket existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the administrative write transaction fails.
    fn drop_bucket(&self, name: &str) -> StorageResult<bool>;

    /// List the names of all buckets, in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the read transaction fails.
    fn list_buckets(&self) -> StorageResult<Vec<String>>;
}

/// A transaction that provides ACID key-value operations on buckets.
///
/// Write transactions must be explicitly committed; dropping one without
/// committing rolls its changes back. Every operation naming a bucket that
/// does not exist in the transaction's view fails with
/// [`StorageError::BucketNotFound`](super::StorageError::BucketNotFound);
/// buckets are never created implicitly.
pub trait Transaction {
    /// The cursor type for iteration.
    type Cursor<'a>: Cursor
    where
        Self: 'a;

    /// Check whether a bucket exists in this transaction's view.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot enumerate its buckets.
    fn has_bucket(&self, bucket: &str) -> StorageResult<bool>;

    /// Get a value by key from a bucket.
    ///
    /// Returns an owned copy of the value, `Ok(None)` if the key is absent.
    ///
    /// # Errors
    ///
    /// Returns `BucketNotFound` if the bucket doesn't exist.
    fn get(&self, bucket: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Insert or replace a key-value pair in a bucket.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadOnly`](super::StorageError::ReadOnly) in a
    /// read-only transaction, `BucketNotFound` if the bucket doesn't exist.
    fn put(&mut self, bucket: &str, key: &[u8], value: &[u8]) -> StorageResult<()>;

    /// Delete a key from a bucket.
    ///
    /// Returns `Ok(true)` if the key was deleted, `Ok(false)` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `ReadOnly` in a read-only transaction, `BucketNotFound` if the
    /// bucket doesn't exist.
    fn delete(&mut self, bucket: &str, key: &[u8]) -> StorageResult<bool>;

    /// Create a cursor over a bucket.
    ///
    /// The cursor starts unpositioned; position it with [`Cursor::seek_first`]
    /// or [`Cursor::seek`].
    ///
    /// # Errors
    ///
    /// Returns `BucketNotFound` if the bucket doesn't exist.
    fn cursor(&self, bucket: &str) -> StorageResult<Self::Cursor<'_>>;

    /// Read up to `limit` keys of a bucket in ascending order, starting at
    /// `from`. Values are not read.
    ///
    /// Each call is independent, so a caller can page through a bucket
    /// between other operations on the same transaction by passing
    /// `Bound::Excluded(last_key)` as the next `from`.
    ///
    /// # Errors
    ///
    /// Returns `BucketNotFound` if the bucket doesn't exist.
    fn keys(&self, bucket: &str, from: Bound<&[u8]>, limit: usize) -> StorageResult<Vec<Vec<u8>>>;

    /// Commit the transaction, making all changes durable.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Transaction`](super::StorageError::Transaction)
    /// if the commit fails.
    fn commit(self) -> StorageResult<()>;

    /// Roll the transaction back, discarding all changes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Transaction`](super::StorageError::Transaction)
    /// if the rollback fails.
    fn rollback(self) -> StorageResult<()>;

    /// Check if this is a read-only transaction.
    fn is_read_only(&self) -> bool;
}

/// A cursor for ordered iteration over the key-value pairs of a bucket.
///
/// ```ignore
/// let mut cursor = tx.cursor("my_bucket")?;
///
/// let mut entry = cursor.seek(b"prefix")?;
/// while let Some((key, _value)) = entry {
///     if !key.starts_with(b"prefix") {
///         break;
///     }
///     entry = cursor.next()?;
/// }
/// ```
pub trait Cursor {
    /// Seek to the first key greater than or equal to `key`.
    fn seek(&mut self, key: &[u8]) -> CursorResult;

    /// Seek to the first key-value pair, or `None` if the bucket is empty.
    fn seek_first(&mut self) -> CursorResult;

    /// Move to the next key-value pair, or `None` at the end.
    ///
    /// An unpositioned cursor starts from the first pair.
    fn next(&mut self) -> CursorResult;

    /// Get the current key-value pair without advancing.
    fn current(&self) -> Option<(&[u8], &[u8])>;
}

/// Implement `StorageEngine` for `Arc<E>` so one engine can back many stores.
impl<E: StorageEngine> StorageEngine for Arc<E> {
    type Transaction = E::Transaction;

    fn begin_read(&self) -> StorageResult<Self::Transaction> {
        (**self).begin_read()
    }

    fn begin_write(&self) -> StorageResult<Self::Transaction> {
        (**self).begin_write()
    }

    fn create_bucket(&self, name: &str) -> StorageResult<bool> {
        (**self).create_bucket(name)
    }

    fn drop_bucket(&self, name: &str) -> StorageResult<bool> {
        (**self).drop_bucket(name)
    }

    fn list_buckets(&self) -> StorageResult<Vec<String>> {
        (**self).list_buckets()
    }
}
