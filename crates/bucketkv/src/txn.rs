//! Capability-narrowed explicit transactions.
//!
//! Both types wrap a scoped [`Store`] and expose a subset of its surface.
//! Like the scoped store, dropping one without completing it rolls back.

use std::fmt;

use bucketkv_storage::StorageEngine;

use crate::cancel::CancelSignal;
use crate::error::Result;
use crate::keys::KeyStream;
use crate::scope::TxnState;
use crate::store::Store;

/// An explicit transaction limited to get, set, has and delete.
pub struct CrudTxn<E: StorageEngine> {
    inner: Store<E>,
}

impl<E: StorageEngine + 'static> CrudTxn<E> {
    pub(crate) const fn new(inner: Store<E>) -> Self {
        Self { inner }
    }

    /// See [`Store::get`].
    ///
    /// # Errors
    ///
    /// See [`Store::get`].
    pub async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.inner.get(key).await
    }

    /// See [`Store::set`].
    ///
    /// # Errors
    ///
    /// See [`Store::set`].
    pub async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.inner.set(key, value).await
    }

    /// See [`Store::has`].
    ///
    /// # Errors
    ///
    /// See [`Store::has`].
    pub async fn has(&self, key: &str) -> Result<bool> {
        self.inner.has(key).await
    }

    /// See [`Store::delete`].
    ///
    /// # Errors
    ///
    /// See [`Store::delete`].
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }

    /// See [`Store::commit`].
    ///
    /// # Errors
    ///
    /// See [`Store::commit`].
    pub async fn commit(&mut self) -> Result<()> {
        self.inner.commit().await
    }

    /// See [`Store::rollback`].
    ///
    /// # Errors
    ///
    /// See [`Store::rollback`].
    pub async fn rollback(&mut self) -> Result<()> {
        self.inner.rollback().await
    }

    /// The transaction's lifecycle state.
    #[must_use]
    pub fn state(&self) -> TxnState {
        self.inner.transaction_state().unwrap_or(TxnState::Open)
    }
}

/// An explicit transaction limited to streaming keys by prefix.
pub struct KeysPrefixTxn<E: StorageEngine> {
    inner: Store<E>,
}

impl<E: StorageEngine + 'static> KeysPrefixTxn<E> {
    pub(crate) const fn new(inner: Store<E>) -> Self {
        Self { inner }
    }

    /// See [`Store::keys_prefix`].
    ///
    /// # Errors
    ///
    /// See [`Store::keys_prefix`].
    pub async fn keys_prefix(&self, prefix: &str, cancel: CancelSignal) -> Result<KeyStream> {
        self.inner.keys_prefix(prefix, cancel).await
    }

    /// See [`Store::commit`].
    ///
    /// # Errors
    ///
    /// See [`Store::commit`].
    pub async fn commit(&mut self) -> Result<()> {
        self.inner.commit().await
    }

    /// See [`Store::rollback`].
    ///
    /// # Errors
    ///
    /// See [`Store::rollback`].
    pub async fn rollback(&mut self) -> Result<()> {
        self.inner.rollback().await
    }

    /// The transaction's lifecycle state.
    #[must_use]
    pub fn state(&self) -> TxnState {
        self.inner.transaction_state().unwrap_or(TxnState::Open)
    }
}

impl<E: StorageEngine> fmt::Debug for CrudTxn<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CrudTxn").field(&self.inner).finish()
    }
}

impl<E: StorageEngine> fmt::Debug for KeysPrefixTxn<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KeysPrefixTxn").field(&self.inner).finish()
    }
}
