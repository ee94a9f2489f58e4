//! Transaction scoping.
//!
//! A store either opens a short-lived engine transaction for every call
//! ([`TxnScope::Implicit`]) or sends every call to a worker that holds one
//! long-lived transaction for it ([`TxnScope::Explicit`]).
//!
//! Engine transactions are blocking and, for redb, pinned to the thread that
//! uses them for their whole life. Both paths therefore run on
//! `spawn_blocking` threads:
//!
//! - implicit: one blocking task per call begins, uses and closes its
//!   transaction;
//! - explicit: one blocking task per transaction owns it and runs the
//!   commands queued on its channel in order until commit, rollback, or the
//!   scoped store being dropped.
//!
//! Key streams take the explicit shape on both paths. An implicit stream
//! gets a read-only worker of its own for as long as the stream lives; a
//! stream in an explicit transaction shares that transaction's worker. In
//! both cases the stream queues one page read at a time through a [`Pager`]
//! and never occupies the worker while it waits for its consumer.

use std::sync::Arc;

use bucketkv_storage::{Bucket, StorageEngine, StorageError, StorageResult, Transaction};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result, TxnContext};
use crate::keys::{KeyPage, KeyScan, ScanRange};

/// Commands queued for an explicit transaction worker.
const COMMAND_QUEUE: usize = 32;

/// Work run against the held transaction and its bucket name.
pub(crate) type Job<T> = Box<dyn FnOnce(&mut T, &str) + Send>;

pub(crate) enum Command<T> {
    Run(Job<T>),
    Commit(oneshot::Sender<StorageResult<()>>),
    Rollback(oneshot::Sender<StorageResult<()>>),
}

/// Lifecycle state of an explicit transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    /// Begun and not yet completed.
    Open,
    /// Committed.
    Committed,
    /// Rolled back.
    RolledBack,
}

/// How a store reaches its engine transaction.
pub(crate) enum TxnScope<T> {
    Implicit,
    Explicit(HeldTxn<T>),
}

/// The store side of an explicit transaction: the worker's command channel.
pub(crate) struct HeldTxn<T> {
    commands: Option<mpsc::Sender<Command<T>>>,
    state: TxnState,
}

impl<T> HeldTxn<T> {
    pub(crate) const fn state(&self) -> TxnState {
        self.state
    }

    /// Queue `job` on the worker.
    async fn submit(&self, job: Job<T>) -> Result<()> {
        let commands = self.commands.as_ref().ok_or(Error::NoActiveTransaction)?;
        commands.send(Command::Run(job)).await.map_err(|_| Error::NoActiveTransaction)
    }

    /// A handle that queues page reads for a key stream.
    ///
    /// The pager does not keep the transaction alive: once it is committed,
    /// rolled back or dropped, page reads fail with `NoActiveTransaction`.
    pub(crate) fn pager(&self, bucket: Arc<str>, context: TxnContext) -> Result<Pager<T>> {
        let commands = self.commands.as_ref().ok_or(Error::NoActiveTransaction)?;
        Ok(Pager { commands: commands.downgrade(), bucket, context })
    }

    /// Commit or roll back, leaving the transaction in a terminal state.
    ///
    /// Only a successful commit ends in [`TxnState::Committed`]; a failed
    /// commit, or a worker that is already gone, leaves nothing committed.
    pub(crate) async fn complete(&mut self, commit: bool) -> Result<()> {
        let commands = self.commands.take().ok_or(Error::NoActiveTransaction)?;
        self.state = TxnState::RolledBack;
        let (respond_to, response) = oneshot::channel();
        let command =
            if commit { Command::Commit(respond_to) } else { Command::Rollback(respond_to) };
        commands.send(command).await.map_err(|_| Error::NoActiveTransaction)?;
        let result = response.await.map_err(|_| Error::NoActiveTransaction)?;
        if commit && result.is_ok() {
            self.state = TxnState::Committed;
        }
        result.map_err(|e| Error::storage(e, TxnContext::Open))
    }
}

/// Queues page reads for a key stream on a transaction worker.
pub(crate) struct Pager<T> {
    commands: mpsc::WeakSender<Command<T>>,
    bucket: Arc<str>,
    context: TxnContext,
}

impl<T: Transaction + 'static> Pager<T> {
    pub(crate) fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Read the next page of `range` on the worker.
    ///
    /// The worker is busy only for the read; the page is handed back before
    /// any key is sent to the consumer.
    pub(crate) async fn read(&self, range: ScanRange) -> Result<KeyPage> {
        let commands = self.commands.upgrade().ok_or(Error::NoActiveTransaction)?;
        let (respond_to, response) = oneshot::channel();
        let job: Job<T> = Box::new(move |tx: &mut T, name: &str| {
            let bucket = Bucket::bind(tx, name);
            let _ = respond_to.send(range.read_page(&bucket));
        });
        commands.send(Command::Run(job)).await.map_err(|_| Error::NoActiveTransaction)?;
        drop(commands);
        response
            .await
            .map_err(|_| worker_gone(self.context))?
            .map_err(|e| Error::storage(e, self.context))
    }
}

/// Begin an explicit transaction on a dedicated worker.
///
/// Returns once the worker has begun the transaction and found the bucket.
pub(crate) async fn begin_held<E>(
    engine: Arc<E>,
    bucket: Arc<str>,
    writable: bool,
) -> Result<HeldTxn<E::Transaction>>
where
    E: StorageEngine + 'static,
{
    let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE);
    let (ready_tx, ready_rx) = oneshot::channel();
    tokio::task::spawn_blocking(move || {
        run_worker(&*engine, &bucket, writable, command_rx, ready_tx);
    });

    match ready_rx.await {
        Ok(Ok(())) => Ok(HeldTxn { commands: Some(command_tx), state: TxnState::Open }),
        Ok(Err(e)) => Err(Error::storage(e, TxnContext::New)),
        Err(_) => Err(worker_gone(TxnContext::New)),
    }
}

fn run_worker<E: StorageEngine>(
    engine: &E,
    bucket: &str,
    writable: bool,
    mut commands: mpsc::Receiver<Command<E::Transaction>>,
    ready: oneshot::Sender<StorageResult<()>>,
) {
    let mut tx = match engine.begin(writable) {
        Ok(tx) => tx,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    if let Err(e) = Bucket::resolve(&mut tx, bucket) {
        let _ = ready.send(Err(e));
        return;
    }
    debug!(bucket, writable, "began explicit transaction");
    if ready.send(Ok(())).is_err() {
        // Caller went away before the store was built.
        return;
    }

    while let Some(command) = commands.blocking_recv() {
        match command {
            Command::Run(job) => job(&mut tx, bucket),
            Command::Commit(respond_to) => {
                let result = tx.commit();
                debug!(bucket, ok = result.is_ok(), "committed explicit transaction");
                let _ = respond_to.send(result);
                return;
            }
            Command::Rollback(respond_to) => {
                let result = tx.rollback();
                debug!(bucket, ok = result.is_ok(), "rolled back explicit transaction");
                let _ = respond_to.send(result);
                return;
            }
        }
    }

    warn!(bucket, "explicit transaction dropped without commit or rollback; rolling back");
    if let Err(e) = tx.rollback() {
        warn!(bucket, error = %e, "rollback of dropped transaction failed");
    }
}

/// Run `op` on the bucket in the scope's transaction and wait for it.
///
/// On the implicit path a new transaction is begun (writable only if both
/// `writable` and the store allow it), committed if writable and released
/// otherwise. On the explicit path `writable` is ignored; the held
/// transaction's own mode applies.
pub(crate) async fn exec<E, R, F>(
    scope: &TxnScope<E::Transaction>,
    engine: &Arc<E>,
    bucket: &Arc<str>,
    writable: bool,
    op: F,
) -> Result<R>
where
    E: StorageEngine + 'static,
    R: Send + 'static,
    F: FnOnce(&mut Bucket<'_, E::Transaction>) -> StorageResult<R> + Send + 'static,
{
    match scope {
        TxnScope::Implicit => {
            let engine = Arc::clone(engine);
            let bucket = Arc::clone(bucket);
            tokio::task::spawn_blocking(move || run_implicit(&*engine, &bucket, writable, op))
                .await
                .map_err(|e| {
                    Error::storage(StorageError::Internal(e.to_string()), TxnContext::New)
                })?
                .map_err(|e| Error::storage(e, TxnContext::New))
        }
        TxnScope::Explicit(held) => {
            let (respond_to, response) = oneshot::channel();
            held.submit(Box::new(move |tx: &mut E::Transaction, name: &str| {
                let mut bucket = Bucket::bind(tx, name);
                let _ = respond_to.send(op(&mut bucket));
            }))
            .await?;
            response
                .await
                .map_err(|_| worker_gone(TxnContext::Open))?
                .map_err(|e| Error::storage(e, TxnContext::Open))
        }
    }
}

fn run_implicit<E, R, F>(engine: &E, bucket: &str, writable: bool, op: F) -> StorageResult<R>
where
    E: StorageEngine,
    F: FnOnce(&mut Bucket<'_, E::Transaction>) -> StorageResult<R>,
{
    let mut tx = engine.begin(writable)?;
    trace!(bucket, writable, "began transaction");
    let result = {
        let mut handle = Bucket::resolve(&mut tx, bucket)?;
        op(&mut handle)
    };
    match result {
        Ok(value) if writable => {
            tx.commit()?;
            trace!(bucket, "committed transaction");
            Ok(value)
        }
        Ok(value) => {
            tx.rollback()?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback() {
                warn!(bucket, error = %rollback, "rollback after failed operation failed");
            }
            Err(e)
        }
    }
}

/// Start `scan` in the scope's transaction.
///
/// Returns as soon as the bucket is known to exist; the scan keeps running
/// on a task of its own. On the implicit path the scan owns a read-only
/// transaction until it ends. On the explicit path it reads pages from the
/// held transaction, interleaved with the store's other calls.
pub(crate) async fn start_scan<E>(
    scope: &TxnScope<E::Transaction>,
    engine: &Arc<E>,
    bucket: &Arc<str>,
    scan: KeyScan,
) -> Result<()>
where
    E: StorageEngine + 'static,
{
    match scope {
        TxnScope::Implicit => {
            let mut held = begin_held(Arc::clone(engine), Arc::clone(bucket), false).await?;
            let pager = held.pager(Arc::clone(bucket), TxnContext::New)?;
            tokio::spawn(async move {
                scan.run(pager).await;
                if let Err(e) = held.complete(false).await {
                    warn!(error = %e, "failed to release key stream snapshot");
                }
            });
        }
        TxnScope::Explicit(held) => {
            let pager = held.pager(Arc::clone(bucket), TxnContext::Open)?;
            tokio::spawn(scan.run(pager));
        }
    }
    Ok(())
}

fn worker_gone(context: TxnContext) -> Error {
    Error::storage(StorageError::Transaction("transaction worker exited".to_string()), context)
}
