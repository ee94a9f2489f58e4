//! Capability traits.
//!
//! Code that only needs part of a store's surface can be written against
//! these traits and accept a [`Store`], a [`CrudTxn`] or a [`KeysPrefixTxn`]
//! alike.
//!
//! | type            | crud | keys | keys_prefix | complete | begin |
//! |-----------------|------|------|-------------|----------|-------|
//! | `Store`         | yes  | yes  | yes         | yes      | yes   |
//! | `CrudTxn`       | yes  |      |             | yes      |       |
//! | `KeysPrefixTxn` |      |      | yes         | yes      |       |

use async_trait::async_trait;
use bucketkv_storage::StorageEngine;

use crate::cancel::CancelSignal;
use crate::error::Result;
use crate::keys::KeyStream;
use crate::store::Store;
use crate::txn::{CrudTxn, KeysPrefixTxn};

/// Get, set, has and delete on one bucket.
#[async_trait]
pub trait CrudBucket: Send + Sync {
    /// Get an owned copy of the value at `key`, or
    /// [`Error::KeyNotFound`](crate::Error::KeyNotFound).
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Set `key` to `value`.
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Whether `key` is present.
    async fn has(&self, key: &str) -> Result<bool>;

    /// Delete `key`; absent keys are not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Streaming every key of a bucket.
#[async_trait]
pub trait KeysTraversingBucket: Send + Sync {
    /// Stream every key in ascending order.
    async fn keys(&self, cancel: CancelSignal) -> Result<KeyStream>;
}

/// Streaming the keys of a bucket that share a prefix.
#[async_trait]
pub trait KeysPrefixTraversingBucket: Send + Sync {
    /// Stream every key starting with `prefix` in ascending order.
    async fn keys_prefix(&self, prefix: &str, cancel: CancelSignal) -> Result<KeyStream>;
}

/// Completing an explicit transaction.
#[async_trait]
pub trait TxnCompleter: Send {
    /// Commit the transaction.
    async fn commit(&mut self) -> Result<()>;

    /// Roll the transaction back.
    async fn rollback(&mut self) -> Result<()>;
}

/// Beginning explicit transactions in each of their shapes.
#[async_trait]
pub trait BucketTxnBeginner: Send + Sync {
    /// The unrestricted transaction.
    type Txn: CrudBucket + KeysTraversingBucket + KeysPrefixTraversingBucket + TxnCompleter;
    /// The get/set/has/delete transaction.
    type CrudTxn: CrudBucket + TxnCompleter;
    /// The prefix streaming transaction.
    type KeysPrefixTxn: KeysPrefixTraversingBucket + TxnCompleter;

    /// Begin an unrestricted transaction.
    async fn begin_bucket_txn(&self) -> Result<Self::Txn>;

    /// Begin a get/set/has/delete transaction.
    async fn begin_crud_bucket_txn(&self) -> Result<Self::CrudTxn>;

    /// Begin a prefix streaming transaction.
    async fn begin_keys_prefix_bucket_txn(&self) -> Result<Self::KeysPrefixTxn>;
}

#[async_trait]
impl<E: StorageEngine + 'static> CrudBucket for Store<E> {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        Self::get(self, key).await
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        Self::set(self, key, value).await
    }

    async fn has(&self, key: &str) -> Result<bool> {
        Self::has(self, key).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        Self::delete(self, key).await
    }
}

#[async_trait]
impl<E: StorageEngine + 'static> KeysTraversingBucket for Store<E> {
    async fn keys(&self, cancel: CancelSignal) -> Result<KeyStream> {
        Self::keys(self, cancel).await
    }
}

#[async_trait]
impl<E: StorageEngine + 'static> KeysPrefixTraversingBucket for Store<E> {
    async fn keys_prefix(&self, prefix: &str, cancel: CancelSignal) -> Result<KeyStream> {
        Self::keys_prefix(self, prefix, cancel).await
    }
}

#[async_trait]
impl<E: StorageEngine + 'static> TxnCompleter for Store<E> {
    async fn commit(&mut self) -> Result<()> {
        Self::commit(self).await
    }

    async fn rollback(&mut self) -> Result<()> {
        Self::rollback(self).await
    }
}

#[async_trait]
impl<E: StorageEngine + 'static> BucketTxnBeginner for Store<E> {
    type Txn = Self;
    type CrudTxn = CrudTxn<E>;
    type KeysPrefixTxn = KeysPrefixTxn<E>;

    async fn begin_bucket_txn(&self) -> Result<Self::Txn> {
        self.begin_transaction().await
    }

    async fn begin_crud_bucket_txn(&self) -> Result<Self::CrudTxn> {
        self.begin_crud_transaction().await
    }

    async fn begin_keys_prefix_bucket_txn(&self) -> Result<Self::KeysPrefixTxn> {
        self.begin_keys_prefix_transaction().await
    }
}

#[async_trait]
impl<E: StorageEngine + 'static> CrudBucket for CrudTxn<E> {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        Self::get(self, key).await
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        Self::set(self, key, value).await
    }

    async fn has(&self, key: &str) -> Result<bool> {
        Self::has(self, key).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        Self::delete(self, key).await
    }
}

#[async_trait]
impl<E: StorageEngine + 'static> TxnCompleter for CrudTxn<E> {
    async fn commit(&mut self) -> Result<()> {
        Self::commit(self).await
    }

    async fn rollback(&mut self) -> Result<()> {
        Self::rollback(self).await
    }
}

#[async_trait]
impl<E: StorageEngine + 'static> KeysPrefixTraversingBucket for KeysPrefixTxn<E> {
    async fn keys_prefix(&self, prefix: &str, cancel: CancelSignal) -> Result<KeyStream> {
        Self::keys_prefix(self, prefix, cancel).await
    }
}

#[async_trait]
impl<E: StorageEngine + 'static> TxnCompleter for KeysPrefixTxn<E> {
    async fn commit(&mut self) -> Result<()> {
        Self::commit(self).await
    }

    async fn rollback(&mut self) -> Result<()> {
        Self::rollback(self).await
    }
}
