//! `bucketkv`
//!
//! Transactional key-value access to a single bucket of an embedded,
//! ordered storage engine.
//!
//! # Overview
//!
//! A [`Store`] names one bucket in one engine. Used directly, every call runs
//! in a transaction of its own: reads in a read-only snapshot, writes in a
//! write transaction committed before the call returns. To group calls,
//! begin a transaction; the returned scoped store (or one of the narrower
//! [`CrudTxn`] and [`KeysPrefixTxn`]) shares one engine transaction across
//! calls until it is committed or rolled back.
//!
//! Keys are enumerated as a [`KeyStream`]: a bounded channel fed by a worker
//! that walks a bucket cursor inside the transaction. Streams can be
//! cancelled with a [`CancelSignal`], and a stalled consumer releases the
//! transaction after [`StoreConfig::stream_send_timeout`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use bucketkv::{CancelSignal, Store};
//! use bucketkv_storage::backends::RedbEngine;
//! use bucketkv_storage::StorageEngine;
//!
//! let engine = Arc::new(RedbEngine::open("kv.redb")?);
//! engine.create_bucket("devices")?;
//! let store = Store::new(engine, "devices");
//!
//! store.set("serial:1", b"enrolled").await?;
//! assert!(store.has("serial:1").await?);
//!
//! let mut keys = store.keys_prefix("serial:", CancelSignal::never()).await?;
//! while let Some(key) = keys.next_key().await {
//!     println!("{key}");
//! }
//! ```
//!
//! # Modules
//!
//! - [`capability`] - Traits for each slice of the store surface
//! - [`cancel`] - Stream cancellation signals
//! - [`keys`] - Key streams

pub mod cancel;
pub mod capability;
mod config;
mod error;
pub mod keys;
mod scope;
mod store;
mod txn;

pub use cancel::{CancelSignal, Canceller};
pub use capability::{
    BucketTxnBeginner, CrudBucket, KeysPrefixTraversingBucket, KeysTraversingBucket, TxnCompleter,
};
pub use config::{
    StoreConfig, DEFAULT_STREAM_BUFFER, DEFAULT_STREAM_PAGE_SIZE, DEFAULT_STREAM_SEND_TIMEOUT,
};
pub use error::{Error, ErrorKind, Result, TxnContext};
pub use keys::{KeyStream, StreamEnd};
pub use scope::TxnState;
pub use store::Store;
pub use txn::{CrudTxn, KeysPrefixTxn};
