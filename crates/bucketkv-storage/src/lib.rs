//! `bucketkv` Storage
//!
//! This crate provides the storage engine abstraction and the redb backend
//! that `bucketkv` stores sit in front of.
//!
//! # Overview
//!
//! An engine holds named buckets: independently sorted key spaces. Every read
//! and write happens inside a transaction, and buckets are addressed by name
//! within it. Buckets are created and dropped through the engine's
//! administration helpers, never implicitly by a write.
//!
//! # Core Traits
//!
//! - [`StorageEngine`] - The main entry point for storage operations
//! - [`Transaction`] - ACID transaction support with read/write operations
//! - [`Cursor`] - Ordered iteration over key-value pairs
//!
//! # Example
//!
//! ```ignore
//! use bucketkv_storage::backends::RedbEngine;
//! use bucketkv_storage::{Bucket, StorageEngine, Transaction};
//!
//! let engine = RedbEngine::open("my_database.redb")?;
//! engine.create_bucket("users")?;
//!
//! let mut tx = engine.begin_write()?;
//! let mut users = Bucket::resolve(&mut tx, "users")?;
//! users.put(b"user:1", b"Alice")?;
//! tx.commit()?;
//! ```
//!
//! # Modules
//!
//! - [`engine`] - Storage engine traits and abstractions
//! - [`backends`] - Concrete storage backend implementations

pub mod backends;
pub mod engine;

pub use engine::{
    Bucket, Cursor, CursorResult, KeyValue, StorageEngine, StorageError, StorageResult,
    Transaction,
};
