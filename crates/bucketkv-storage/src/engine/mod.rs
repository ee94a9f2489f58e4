//! Storage engine traits and abstractions.
//!
//! This module defines the core traits that storage backends must implement:
//!
//! - [`StorageEngine`] - Entry point for transactions and bucket administration
//! - [`Transaction`] - ACID transaction with bucket-scoped get/put/delete/cursor
//! - [`Cursor`] - Ordered iteration over key-value pairs
//!
//! plus [`Bucket`], a bucket handle resolved inside one transaction.
//!
//! # Error Handling
//!
//! All operations return [`StorageResult<T>`] which is an alias for
//! `Result<T, StorageError>`. See [`StorageError`] for the possible error variants.

mod bucket;
mod error;
mod traits;

pub use bucket::Bucket;
pub use error::{StorageError, StorageResult};
pub use traits::{Cursor, CursorResult, KeyValue, StorageEngine, Transaction};
