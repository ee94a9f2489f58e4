//! Redb storage engine implementation.
//!
//! This module provides the `RedbEngine` type which implements the
//! `StorageEngine` trait using the Redb embedded database.

use std::path::Path;

use redb::Database;
use tracing::debug;

use crate::engine::{StorageEngine, StorageError, StorageResult};

use super::tables::{bucket_definition, contains_table, table_error};
use super::transaction::RedbTransaction;

/// Default number of entries a cursor loads per batch.
pub const DEFAULT_CURSOR_BATCH_SIZE: usize = 1000;

/// Configuration options for the Redb storage engine.
#[derive(Debug, Clone, Copy)]
pub struct RedbConfig {
    /// Cache size in bytes.
    /// If not set, uses Redb's default.
    pub cache_size: Option<usize>,

    /// Maximum number of entries a cursor holds in memory at once.
    pub cursor_batch_size: usize,
}

impl RedbConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache size.
    #[must_use]
    pub const fn cache_size(mut self, size: usize) -> Self {
        self.cache_size = Some(size);
        self
    }

    /// Set the cursor batch size. Values below 1 are raised to 1.
    #[must_use]
    pub const fn cursor_batch_size(mut self, size: usize) -> Self {
        self.cursor_batch_size = if size == 0 { 1 } else { size };
        self
    }
}

impl Default for RedbConfig {
    fn default() -> Self {
        Self { cache_size: None, cursor_batch_size: DEFAULT_CURSOR_BATCH_SIZE }
    }
}

/// A storage engine backed by Redb.
///
/// Each bucket is a Redb table. Redb admits a single write transaction at a
/// time (a second `begin_write` blocks until the first one finishes) and any
/// number of snapshot readers.
///
/// # Example
///
/// ```ignore
/// use bucketkv_storage::backends::RedbEngine;
///
/// let engine = RedbEngine::open("my_database.redb")?;
/// engine.create_bucket("users")?;
///
/// let mut tx = engine.begin_write()?;
/// tx.put("users", b"user:1", b"Alice")?;
/// tx.commit()?;
/// ```
pub struct RedbEngine {
    /// The underlying Redb database.
    db: Database,

    /// Engine configuration.
    config: RedbConfig,
}

impl RedbEngine {
    /// Open or create a database at the given path with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::open_with_config(path, RedbConfig::default())
    }

    /// Open or create a database at the given path with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if the database cannot be opened or created.
    pub fn open_with_config(path: impl AsRef<Path>, config: RedbConfig) -> StorageResult<Self> {
        let mut builder = Database::builder();

        if let Some(cache_size) = config.cache_size {
            builder.set_cache_size(cache_size);
        }

        let db = builder.create(path.as_ref()).map_err(|e| StorageError::Open(e.to_string()))?;
        debug!(path = %path.as_ref().display(), "opened redb database");

        Ok(Self { db, config })
    }

    /// Create an in-memory database for testing.
    ///
    /// The database will be lost when the engine is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if the database cannot be created.
    pub fn in_memory() -> StorageResult<Self> {
        Self::in_memory_with_config(RedbConfig::default())
    }

    /// Create an in-memory database with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if the database cannot be created.
    pub fn in_memory_with_config(config: RedbConfig) -> StorageResult<Self> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(|e| StorageError::Open(e.to_string()))?;

        Ok(Self { db, config })
    }

    /// The engine configuration.
    #[must_use]
    pub const fn config(&self) -> &RedbConfig {
        &self.config
    }

    /// Get the underlying Redb database.
    pub const fn inner(&self) -> &Database {
        &self.db
    }
}

impl StorageEngine for RedbEngine {
    type Transaction = RedbTransaction;

    fn begin_read(&self) -> StorageResult<Self::Transaction> {
        let tx = self.db.begin_read().map_err(|e| StorageError::Transaction(e.to_string()))?;
        Ok(RedbTransaction::new_read(tx, self.config.cursor_batch_size))
    }

    fn begin_write(&self) -> StorageResult<Self::Transaction> {
        let tx = self.db.begin_write().map_err(|e| StorageError::Transaction(e.to_string()))?;
        Ok(RedbTransaction::new_write(tx, self.config.cursor_batch_size))
    }

    fn create_bucket(&self, name: &str) -> StorageResult<bool> {
        let tx = self.db.begin_write().map_err(|e| StorageError::Transaction(e.to_string()))?;
        let tables = tx.list_tables().map_err(|e| StorageError::Internal(e.to_string()))?;
        let existed = contains_table(tables, name);
        if !existed {
            // Opening a table in a write transaction creates it.
            tx.open_table(bucket_definition(name)).map_err(|e| table_error(name, e))?;
        }
        tx.commit().map_err(|e| StorageError::Transaction(e.to_string()))?;

        if !existed {
            debug!(bucket = name, "created bucket");
        }
        Ok(!existed)
    }

    fn drop_bucket(&self, name: &str) -> StorageResult<bool> {
        let tx = self.db.begin_write().map_err(|e| StorageError::Transaction(e.to_string()))?;
        let existed =
            tx.delete_table(bucket_definition(name)).map_err(|e| table_error(name, e))?;
        tx.commit().map_err(|e| StorageError::Transaction(e.to_string()))?;

        if existed {
            debug!(bucket = name, "dropped bucket");
        }
        Ok(existed)
    }

    fn list_buckets(&self) -> StorageResult<Vec<String>> {
        use redb::TableHandle;

        let tx = self.db.begin_read().map_err(|e| StorageError::Transaction(e.to_string()))?;
        let tables = tx.list_tables().map_err(|e| StorageError::Internal(e.to_string()))?;
        let mut names: Vec<String> = tables.map(|table| table.name().to_string()).collect();
        names.sort();
        Ok(names)
    }
}
