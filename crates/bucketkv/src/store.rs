//! The bucket store.

use std::fmt;
use std::sync::Arc;

use bucketkv_storage::{Bucket, StorageEngine, StorageResult};
use tracing::debug;

use crate::cancel::CancelSignal;
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::keys::{KeyScan, KeyStream};
use crate::scope::{self, TxnScope, TxnState};
use crate::txn::{CrudTxn, KeysPrefixTxn};

/// Key-value access to one bucket of a storage engine.
///
/// A store built with [`Store::new`] runs every call in its own engine
/// transaction. [`begin_transaction`](Self::begin_transaction) returns a
/// scoped store whose calls all share one transaction until it is committed
/// or rolled back; dropping a scoped store without either rolls it back.
///
/// The bucket must already exist; see
/// [`StorageEngine::create_bucket`](bucketkv_storage::StorageEngine::create_bucket).
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use bucketkv::Store;
/// use bucketkv_storage::backends::RedbEngine;
///
/// let engine = Arc::new(RedbEngine::open("kv.redb")?);
/// engine.create_bucket("devices")?;
/// let store = Store::new(engine, "devices");
///
/// store.set("serial:1", b"enrolled").await?;
///
/// let mut txn = store.begin_transaction().await?;
/// txn.delete("serial:1").await?;
/// txn.set("serial:2", b"enrolled").await?;
/// txn.commit().await?;
/// ```
pub struct Store<E: StorageEngine> {
    engine: Arc<E>,
    bucket: Arc<str>,
    config: StoreConfig,
    scope: TxnScope<E::Transaction>,
}

impl<E: StorageEngine + 'static> Store<E> {
    /// Create a store over `bucket` with default configuration.
    pub fn new(engine: Arc<E>, bucket: impl Into<Arc<str>>) -> Self {
        Self::with_config(engine, bucket, StoreConfig::default())
    }

    /// Create a store over `bucket` with custom configuration.
    pub fn with_config(engine: Arc<E>, bucket: impl Into<Arc<str>>, config: StoreConfig) -> Self {
        Self { engine, bucket: bucket.into(), config, scope: TxnScope::Implicit }
    }

    /// The bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The store configuration.
    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The shared engine.
    #[must_use]
    pub const fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// The state of the held transaction, or `None` for a store that runs
    /// each call in its own transaction.
    #[must_use]
    pub fn transaction_state(&self) -> Option<TxnState> {
        match &self.scope {
            TxnScope::Implicit => None,
            TxnScope::Explicit(held) => Some(held.state()),
        }
    }

    /// Get an owned copy of the value at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyNotFound`] if the key is absent,
    /// [`Error::BucketNotFound`] if the bucket is missing, and
    /// [`Error::Engine`] if the engine fails.
    pub async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let raw = key.as_bytes().to_vec();
        let value = self.exec(false, move |bucket| bucket.get(&raw)).await?;
        value.ok_or_else(|| Error::KeyNotFound { key: key.to_string() })
    }

    /// Set `key` to `value`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Engine`] wrapping
    /// [`StorageError::ReadOnly`](bucketkv_storage::StorageError::ReadOnly)
    /// on a read-only store or transaction.
    pub async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let raw = key.as_bytes().to_vec();
        let value = value.to_vec();
        self.exec(true, move |bucket| bucket.put(&raw, &value)).await
    }

    /// Whether `key` is present. Absence is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BucketNotFound`] or [`Error::Engine`].
    pub async fn has(&self, key: &str) -> Result<bool> {
        let raw = key.as_bytes().to_vec();
        self.exec(false, move |bucket| Ok(bucket.get(&raw)?.is_some())).await
    }

    /// Delete `key`. Deleting an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BucketNotFound`] or [`Error::Engine`].
    pub async fn delete(&self, key: &str) -> Result<()> {
        let raw = key.as_bytes().to_vec();
        self.exec(true, move |bucket| bucket.delete(&raw).map(drop)).await
    }

    /// Stream every key in the bucket in ascending order.
    ///
    /// On a store without a held transaction the stream reads from its own
    /// snapshot, held until the stream ends. Inside a held transaction the
    /// stream sees the transaction's uncommitted writes, and later calls on
    /// the transaction wait until the stream ends.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BucketNotFound`] if the bucket is missing.
    pub async fn keys(&self, cancel: CancelSignal) -> Result<KeyStream> {
        self.scan(None, cancel).await
    }

    /// Stream every key starting with `prefix` in ascending order.
    ///
    /// See [`keys`](Self::keys) for how the stream relates to transactions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BucketNotFound`] if the bucket is missing.
    pub async fn keys_prefix(&self, prefix: &str, cancel: CancelSignal) -> Result<KeyStream> {
        self.scan(Some(prefix), cancel).await
    }

    /// Begin a transaction and return a store scoped to it.
    ///
    /// The transaction is writable unless the store is read-only. Only one
    /// writable transaction exists engine-wide; this waits for any other.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NestedTransaction`] on a scoped store and
    /// [`Error::BucketNotFound`] if the bucket is missing.
    pub async fn begin_transaction(&self) -> Result<Self> {
        if matches!(self.scope, TxnScope::Explicit(_)) {
            return Err(Error::NestedTransaction);
        }
        let held = scope::begin_held(
            Arc::clone(&self.engine),
            Arc::clone(&self.bucket),
            !self.config.read_only,
        )
        .await?;
        Ok(Self {
            engine: Arc::clone(&self.engine),
            bucket: Arc::clone(&self.bucket),
            config: self.config,
            scope: TxnScope::Explicit(held),
        })
    }

    /// Begin a transaction exposing only get, set, has and delete.
    ///
    /// # Errors
    ///
    /// See [`begin_transaction`](Self::begin_transaction).
    pub async fn begin_crud_transaction(&self) -> Result<CrudTxn<E>> {
        self.begin_transaction().await.map(CrudTxn::new)
    }

    /// Begin a transaction exposing only prefix streaming.
    ///
    /// # Errors
    ///
    /// See [`begin_transaction`](Self::begin_transaction).
    pub async fn begin_keys_prefix_transaction(&self) -> Result<KeysPrefixTxn<E>> {
        self.begin_transaction().await.map(KeysPrefixTxn::new)
    }

    /// Commit the held transaction.
    ///
    /// Waits for any stream still reading from the transaction to end.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveTransaction`] if there is no open held
    /// transaction, or [`Error::Engine`] if the commit fails. A failed commit
    /// still ends the transaction.
    pub async fn commit(&mut self) -> Result<()> {
        self.complete(true).await
    }

    /// Roll back the held transaction, discarding its writes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveTransaction`] if there is no open held
    /// transaction.
    pub async fn rollback(&mut self) -> Result<()> {
        self.complete(false).await
    }

    async fn complete(&mut self, commit: bool) -> Result<()> {
        let TxnScope::Explicit(held) = &mut self.scope else {
            return Err(Error::NoActiveTransaction);
        };
        held.complete(commit).await?;
        debug!(bucket = %self.bucket, commit, "completed transaction");
        Ok(())
    }

    async fn exec<R, F>(&self, writable: bool, op: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut Bucket<'_, E::Transaction>) -> StorageResult<R> + Send + 'static,
    {
        let writable = writable && !self.config.read_only;
        scope::exec(&self.scope, &self.engine, &self.bucket, writable, op).await
    }

    async fn scan(&self, prefix: Option<&str>, cancel: CancelSignal) -> Result<KeyStream> {
        let (scan, stream) = KeyScan::new(prefix, cancel, &self.config);
        scope::start_scan(&self.scope, &self.engine, &self.bucket, scan).await?;
        Ok(stream)
    }
}

impl<E: StorageEngine> fmt::Debug for Store<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.scope {
            TxnScope::Implicit => None,
            TxnScope::Explicit(held) => Some(held.state()),
        };
        f.debug_struct("Store")
            .field("bucket", &self.bucket)
            .field("config", &self.config)
            .field("transaction", &state)
            .finish_non_exhaustive()
    }
}
