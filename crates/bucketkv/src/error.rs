//! Error types for bucket stores.

use std::fmt;

use bucketkv_storage::StorageError;
use thiserror::Error;

/// Which transaction an engine error happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnContext {
    /// A transaction begun explicitly by the caller and still held.
    Open,
    /// A transaction opened for a single call.
    New,
}

impl fmt::Display for TxnContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("in open transaction"),
            Self::New => f.write_str("in new transaction"),
        }
    }
}

/// Errors returned by store operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The key is not present in the bucket.
    #[error("key not found: {key}")]
    KeyNotFound {
        /// The missing key.
        key: String,
    },

    /// The store's bucket does not exist in the transaction's view.
    #[error("bucket not found {context}: {bucket}")]
    BucketNotFound {
        /// The bucket name.
        bucket: String,
        /// Where the lookup happened.
        context: TxnContext,
    },

    /// Commit or rollback without an open explicit transaction.
    #[error("no active transaction")]
    NoActiveTransaction,

    /// A transaction was begun from a store that already holds one.
    #[error("store already holds an open transaction")]
    NestedTransaction,

    /// The engine reported an error.
    #[error("engine failure {context}: {source}")]
    Engine {
        /// Where the failure happened.
        context: TxnContext,
        /// The engine error.
        #[source]
        source: StorageError,
    },
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The kind of an [`Error`], for matching without destructuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`Error::KeyNotFound`].
    KeyNotFound,
    /// See [`Error::BucketNotFound`].
    BucketNotFound,
    /// See [`Error::NoActiveTransaction`].
    NoActiveTransaction,
    /// See [`Error::NestedTransaction`].
    NestedTransaction,
    /// See [`Error::Engine`].
    EngineFailure,
}

impl Error {
    /// Wrap an engine error raised in `context`.
    ///
    /// A missing bucket gets its own variant; everything else is an
    /// [`Error::Engine`].
    #[must_use]
    pub fn storage(source: StorageError, context: TxnContext) -> Self {
        match source {
            StorageError::BucketNotFound(bucket) => Self::BucketNotFound { bucket, context },
            source => Self::Engine { context, source },
        }
    }

    /// The kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::KeyNotFound { .. } => ErrorKind::KeyNotFound,
            Self::BucketNotFound { .. } => ErrorKind::BucketNotFound,
            Self::NoActiveTransaction => ErrorKind::NoActiveTransaction,
            Self::NestedTransaction => ErrorKind::NestedTransaction,
            Self::Engine { .. } => ErrorKind::EngineFailure,
        }
    }

    /// Returns `true` if this error reports a missing key.
    #[must_use]
    pub const fn is_key_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_not_found_is_lifted() {
        let err = Error::storage(StorageError::BucketNotFound("users".into()), TxnContext::New);
        assert_eq!(err.kind(), ErrorKind::BucketNotFound);
        assert_eq!(err.to_string(), "bucket not found in new transaction: users");
    }

    #[test]
    fn test_engine_error_carries_context() {
        let err = Error::storage(StorageError::ReadOnly, TxnContext::Open);
        assert_eq!(err.kind(), ErrorKind::EngineFailure);
        assert_eq!(err.to_string(), "engine failure in open transaction: transaction is read-only");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_key_not_found() {
        let err = Error::KeyNotFound { key: "k".into() };
        assert!(err.is_key_not_found());
        assert_eq!(err.kind(), ErrorKind::KeyNotFound);
        assert!(!Error::NoActiveTransaction.is_key_not_found());
    }
}
