//! Redb transaction implementation.
//!
//! This module provides the `RedbTransaction` type which implements the
//! `Transaction` trait for both read-only and read-write transactions.
//!
//! # Memory-Efficient Cursors
//!
//! The cursor does not hold a Redb range iterator across calls. It loads
//! entries in batches (see [`RedbConfig::cursor_batch_size`]) and fetches the
//! next batch, starting after the last key it returned, when the current one
//! runs out. A cursor over a bucket with a million keys therefore holds about
//! as much memory as one over a bucket with a thousand.
//!
//! [`RedbConfig::cursor_batch_size`]: super::RedbConfig::cursor_batch_size

use std::ops::Bound;

use redb::{ReadTransaction, ReadableTable, WriteTransaction};

use crate::engine::{Cursor, CursorResult, KeyValue, StorageError, StorageResult, Transaction};

use super::tables::{bucket_definition, contains_table, table_error};

/// Either kind of Redb transaction.
///
/// Boxing the `WriteTransaction` would add an indirection to every
/// operation; transactions are short-lived.
#[allow(clippy::large_enum_variant)]
enum TxKind {
    Read(ReadTransaction),
    Write(WriteTransaction),
}

/// A transaction for the Redb storage engine.
///
/// Wraps both read-only and read-write Redb transactions behind the
/// [`Transaction`] trait. Buckets map to Redb tables; a write transaction
/// checks that a bucket exists before opening it, because opening a missing
/// table for writing would create it.
pub struct RedbTransaction {
    kind: TxKind,
    batch_size: usize,
}

impl RedbTransaction {
    /// Create a new read-only transaction.
    pub const fn new_read(tx: ReadTransaction, batch_size: usize) -> Self {
        Self { kind: TxKind::Read(tx), batch_size }
    }

    /// Create a new read-write transaction.
    pub const fn new_write(tx: WriteTransaction, batch_size: usize) -> Self {
        Self { kind: TxKind::Write(tx), batch_size }
    }

    fn require_bucket(&self, bucket: &str) -> StorageResult<()> {
        if self.has_bucket(bucket)? {
            Ok(())
        } else {
            Err(StorageError::BucketNotFound(bucket.to_string()))
        }
    }

    /// Fetch up to `batch_size` entries of `bucket` starting at `from`.
    fn fetch_batch(&self, bucket: &str, from: Bound<&[u8]>) -> StorageResult<Vec<KeyValue>> {
        let def = bucket_definition(bucket);
        match &self.kind {
            TxKind::Read(tx) => {
                let table = tx.open_table(def).map_err(|e| table_error(bucket, e))?;
                collect_batch(&table, from, self.batch_size)
            }
            TxKind::Write(tx) => {
                let table = tx.open_table(def).map_err(|e| table_error(bucket, e))?;
                collect_batch(&table, from, self.batch_size)
            }
        }
    }
}

/// Read up to `limit` entries of `table` starting at `from`.
fn collect_batch<T>(table: &T, from: Bound<&[u8]>, limit: usize) -> StorageResult<Vec<KeyValue>>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let range = table
        .range::<&[u8]>((from, Bound::Unbounded))
        .map_err(|e| StorageError::Internal(e.to_string()))?;

    let mut entries = Vec::with_capacity(limit.min(1024));
    for result in range.take(limit) {
        let (k, v) = result.map_err(|e| StorageError::Internal(e.to_string()))?;
        entries.push((k.value().to_vec(), v.value().to_vec()));
    }
    Ok(entries)
}

/// Read up to `limit` keys of `table` starting at `from`, leaving values
/// in place.
fn collect_keys<T>(table: &T, from: Bound<&[u8]>, limit: usize) -> StorageResult<Vec<Vec<u8>>>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let range = table
        .range::<&[u8]>((from, Bound::Unbounded))
        .map_err(|e| StorageError::Internal(e.to_string()))?;

    let mut keys = Vec::with_capacity(limit.min(1024));
    for result in range.take(limit) {
        let (k, _) = result.map_err(|e| StorageError::Internal(e.to_string()))?;
        keys.push(k.value().to_vec());
    }
    Ok(keys)
}

impl Transaction for RedbTransaction {
    type Cursor<'a>
        = RedbCursor<'a>
    where
        Self: 'a;

    fn has_bucket(&self, bucket: &str) -> StorageResult<bool> {
        let found = match &self.kind {
            TxKind::Read(tx) => contains_table(
                tx.list_tables().map_err(|e| StorageError::Internal(e.to_string()))?,
                bucket,
            ),
            TxKind::Write(tx) => contains_table(
                tx.list_tables().map_err(|e| StorageError::Internal(e.to_string()))?,
                bucket,
            ),
        };
        Ok(found)
    }

    fn get(&self, bucket: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let def = bucket_definition(bucket);
        match &self.kind {
            TxKind::Read(tx) => {
                let table = tx.open_table(def).map_err(|e| table_error(bucket, e))?;
                let value = table.get(key).map_err(|e| StorageError::Internal(e.to_string()))?;
                Ok(value.map(|v| v.value().to_vec()))
            }
            TxKind::Write(tx) => {
                self.require_bucket(bucket)?;
                let table = tx.open_table(def).map_err(|e| table_error(bucket, e))?;
                let value = table.get(key).map_err(|e| StorageError::Internal(e.to_string()))?;
                Ok(value.map(|v| v.value().to_vec()))
            }
        }
    }

    fn put(&mut self, bucket: &str, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.require_bucket(bucket)?;
        match &mut self.kind {
            TxKind::Read(_) => Err(StorageError::ReadOnly),
            TxKind::Write(tx) => {
                let mut table =
                    tx.open_table(bucket_definition(bucket)).map_err(|e| table_error(bucket, e))?;
                table.insert(key, value).map_err(|e| StorageError::Internal(e.to_string()))?;
                Ok(())
            }
        }
    }

    fn delete(&mut self, bucket: &str, key: &[u8]) -> StorageResult<bool> {
        self.require_bucket(bucket)?;
        match &mut self.kind {
            TxKind::Read(_) => Err(StorageError::ReadOnly),
            TxKind::Write(tx) => {
                let mut table =
                    tx.open_table(bucket_definition(bucket)).map_err(|e| table_error(bucket, e))?;
                let removed =
                    table.remove(key).map_err(|e| StorageError::Internal(e.to_string()))?;
                Ok(removed.is_some())
            }
        }
    }

    fn cursor(&self, bucket: &str) -> StorageResult<Self::Cursor<'_>> {
        self.require_bucket(bucket)?;
        Ok(RedbCursor::new(self, bucket.to_string(), self.batch_size))
    }

    fn keys(&self, bucket: &str, from: Bound<&[u8]>, limit: usize) -> StorageResult<Vec<Vec<u8>>> {
        let def = bucket_definition(bucket);
        let limit = limit.max(1);
        match &self.kind {
            TxKind::Read(tx) => {
                let table = tx.open_table(def).map_err(|e| table_error(bucket, e))?;
                collect_keys(&table, from, limit)
            }
            TxKind::Write(tx) => {
                self.require_bucket(bucket)?;
                let table = tx.open_table(def).map_err(|e| table_error(bucket, e))?;
                collect_keys(&table, from, limit)
            }
        }
    }

    fn commit(self) -> StorageResult<()> {
        match self.kind {
            // Read transactions release their snapshot when dropped.
            TxKind::Read(_) => Ok(()),
            TxKind::Write(tx) => tx.commit().map_err(|e| StorageError::Transaction(e.to_string())),
        }
    }

    fn rollback(self) -> StorageResult<()> {
        match self.kind {
            TxKind::Read(_) => Ok(()),
            TxKind::Write(tx) => tx.abort().map_err(|e| StorageError::Transaction(e.to_string())),
        }
    }

    fn is_read_only(&self) -> bool {
        matches!(self.kind, TxKind::Read(_))
    }
}

/// A forward cursor over one bucket of a [`RedbTransaction`].
///
/// At any time the cursor holds at most one batch of entries plus the
/// current entry.
pub struct RedbCursor<'a> {
    /// Transaction used to fetch further batches.
    tx: &'a RedbTransaction,
    /// The bucket being iterated.
    bucket: String,
    /// Current batch of entries.
    batch: Vec<KeyValue>,
    /// Position within the current batch; `None` when unpositioned.
    position: Option<usize>,
    /// Maximum entries per batch.
    batch_size: usize,
    /// Whether entries may follow the current batch.
    has_more: bool,
    /// Cached current entry for [`Cursor::current`].
    current_entry: Option<KeyValue>,
}

impl<'a> RedbCursor<'a> {
    /// Create an unpositioned cursor.
    pub fn new(tx: &'a RedbTransaction, bucket: String, batch_size: usize) -> Self {
        Self {
            tx,
            bucket,
            batch: Vec::new(),
            position: None,
            batch_size: batch_size.max(1),
            has_more: true,
            current_entry: None,
        }
    }

    /// Replace the batch with entries starting at `from` and move to its head.
    fn load_batch(&mut self, from: Bound<&[u8]>) -> CursorResult {
        self.batch = self.tx.fetch_batch(&self.bucket, from)?;
        self.has_more = self.batch.len() >= self.batch_size;
        if self.batch.is_empty() {
            self.position = None;
            self.current_entry = None;
        } else {
            self.position = Some(0);
            self.current_entry = self.batch.first().cloned();
        }
        Ok(self.current_entry.clone())
    }

    /// Load the batch following the last key of the current one.
    fn load_next_batch(&mut self) -> CursorResult {
        if !self.has_more {
            self.position = None;
            self.current_entry = None;
            return Ok(None);
        }
        let after = match self.batch.last() {
            Some((key, _)) => key.clone(),
            None => return self.load_batch(Bound::Unbounded),
        };
        self.load_batch(Bound::Excluded(after.as_slice()))
    }
}

impl Cursor for RedbCursor<'_> {
    fn seek(&mut self, key: &[u8]) -> CursorResult {
        self.load_batch(Bound::Included(key))
    }

    fn seek_first(&mut self) -> CursorResult {
        self.load_batch(Bound::Unbounded)
    }

    fn next(&mut self) -> CursorResult {
        match self.position {
            None if self.batch.is_empty() && self.current_entry.is_none() && self.has_more => {
                self.seek_first()
            }
            None => Ok(None),
            Some(pos) if pos + 1 < self.batch.len() => {
                self.position = Some(pos + 1);
                self.current_entry = self.batch.get(pos + 1).cloned();
                Ok(self.current_entry.clone())
            }
            Some(_) => self.load_next_batch(),
        }
    }

    fn current(&self) -> Option<(&[u8], &[u8])> {
        self.current_entry.as_ref().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }
}
