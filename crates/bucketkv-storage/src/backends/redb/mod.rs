//! Redb storage backend.
//!
//! This module provides a storage backend implementation using Redb,
//! a pure-Rust embedded database with ACID transactions.
//!
//! Each bucket is a Redb table, so bucket isolation and key ordering come
//! straight from Redb. Write transactions are serialized by Redb itself.
//!
//! # Example
//!
//! ```ignore
//! use bucketkv_storage::backends::RedbEngine;
//! use bucketkv_storage::{StorageEngine, Transaction};
//!
//! let engine = RedbEngine::open("my_database.redb")?;
//! engine.create_bucket("users")?;
//!
//! let mut tx = engine.begin_write()?;
//! tx.put("users", b"user:1", b"Alice")?;
//! tx.commit()?;
//!
//! let tx = engine.begin_read()?;
//! assert_eq!(tx.get("users", b"user:1")?, Some(b"Alice".to_vec()));
//! ```
//!
//! # In-Memory Databases
//!
//! For testing, you can create an in-memory database that doesn't persist:
//!
//! ```ignore
//! let engine = RedbEngine::in_memory()?;
//! ```
//!
//! # Configuration
//!
//! ```ignore
//! use bucketkv_storage::backends::redb::{RedbConfig, RedbEngine};
//!
//! let config = RedbConfig::new()
//!     .cache_size(100 * 1024 * 1024)
//!     .cursor_batch_size(256);
//!
//! let engine = RedbEngine::open_with_config("my_database.redb", config)?;
//! ```

mod engine;
pub mod tables;
mod transaction;

pub use engine::{RedbConfig, RedbEngine, DEFAULT_CURSOR_BATCH_SIZE};
pub use transaction::{RedbCursor, RedbTransaction};
