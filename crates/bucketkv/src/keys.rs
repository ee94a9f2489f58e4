//! Streaming key enumeration.
//!
//! A [`KeyScan`] reads a bucket's keys a page at a time through a `Pager`,
//! a handle on the worker that owns the transaction, and feeds them into a
//! bounded channel that the consumer reads as a [`KeyStream`].
//!
//! Only the page read itself occupies the worker. While the scan waits for
//! the consumer to make room, other operations on the same transaction run
//! between pages, and the next page resumes after the last key sent. Pages
//! carry key names only, so memory stays bounded by the page size and the
//! channel capacity whatever the values weigh.
//!
//! Every send races the consumer's [`CancelSignal`] and the configured send
//! timeout, so a scan never waits forever on a consumer that stopped
//! reading. When the scan ends it drops its sender, closing the channel
//! exactly once, and reports how it ended through a oneshot that
//! [`KeyStream::finish`] collects.

use std::ops::Bound;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bucketkv_storage::{Bucket, StorageResult, Transaction};
use futures_core::Stream;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::cancel::CancelSignal;
use crate::config::StoreConfig;
use crate::error::Error;
use crate::scope::Pager;

/// How a key stream ended.
#[derive(Debug)]
pub enum StreamEnd {
    /// Every matching key was sent.
    Exhausted,
    /// The cancellation signal fired.
    Cancelled,
    /// The consumer stopped reading for longer than the send timeout.
    TimedOut,
    /// The consumer dropped or finished the stream early.
    Closed,
    /// Reading a page failed; keys sent before the failure were valid.
    Failed(Error),
}

impl StreamEnd {
    /// Whether the stream delivered every matching key.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted)
    }
}

/// One page of keys read from a bucket.
#[derive(Debug)]
pub(crate) struct KeyPage {
    keys: Vec<Vec<u8>>,
    /// Whether matching keys may follow the last one.
    more: bool,
}

/// The part of a bucket a scan still has to read.
#[derive(Debug, Clone)]
pub(crate) struct ScanRange {
    prefix: Vec<u8>,
    after: Option<Vec<u8>>,
    page_size: usize,
}

impl ScanRange {
    fn new(prefix: Option<&str>, page_size: usize) -> Self {
        Self {
            prefix: prefix.map(|p| p.as_bytes().to_vec()).unwrap_or_default(),
            after: None,
            page_size: page_size.max(1),
        }
    }

    /// Read the next page of matching keys from `bucket`.
    pub(crate) fn read_page<T: Transaction>(
        &self,
        bucket: &Bucket<'_, T>,
    ) -> StorageResult<KeyPage> {
        let from = match &self.after {
            Some(after) => Bound::Excluded(after.as_slice()),
            None if self.prefix.is_empty() => Bound::Unbounded,
            None => Bound::Included(self.prefix.as_slice()),
        };
        let mut keys = bucket.keys(from, self.page_size)?;
        let full = keys.len() >= self.page_size;
        let matching = keys.iter().take_while(|key| key.starts_with(&self.prefix)).count();
        let more = full && matching == keys.len();
        keys.truncate(matching);
        Ok(KeyPage { keys, more })
    }
}

/// The sending half of a key stream.
struct KeySink {
    tx: mpsc::Sender<String>,
    cancel: CancelSignal,
    send_timeout: Option<Duration>,
}

impl KeySink {
    /// Hand `key` to the consumer, or report why the stream has to stop.
    async fn emit(&self, key: String) -> Result<(), StreamEnd> {
        let expired = async {
            match self.send_timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(StreamEnd::Cancelled),
            sent = self.tx.send(key) => sent.map_err(|_| StreamEnd::Closed),
            () = expired => Err(StreamEnd::TimedOut),
        }
    }
}

/// A keys or keys-with-prefix scan waiting to be run.
pub(crate) struct KeyScan {
    range: ScanRange,
    sink: KeySink,
    end: oneshot::Sender<StreamEnd>,
}

impl KeyScan {
    /// Create a scan and the stream that receives its keys.
    pub(crate) fn new(
        prefix: Option<&str>,
        cancel: CancelSignal,
        config: &StoreConfig,
    ) -> (Self, KeyStream) {
        let (tx, rx) = mpsc::channel(config.stream_buffer.max(1));
        let (end_tx, end_rx) = oneshot::channel();
        let sink =
            KeySink { tx, cancel: cancel.clone(), send_timeout: config.stream_send_timeout };
        let scan =
            Self { range: ScanRange::new(prefix, config.stream_page_size), sink, end: end_tx };
        (scan, KeyStream { rx, cancel, end: Some(end_rx) })
    }

    /// Run the scan to completion through `pager` and report how it ended.
    pub(crate) async fn run<T: Transaction + 'static>(mut self, pager: Pager<T>) {
        let end = self.drive(&pager).await;
        match &end {
            StreamEnd::TimedOut => {
                warn!(bucket = pager.bucket(), "key stream consumer stalled; ending stream");
            }
            StreamEnd::Failed(err) => {
                warn!(bucket = pager.bucket(), error = %err, "key stream failed");
            }
            end => debug!(bucket = pager.bucket(), ?end, "key stream ended"),
        }
        let Self { sink, end: report, .. } = self;
        drop(sink);
        let _ = report.send(end);
    }

    async fn drive<T: Transaction + 'static>(&mut self, pager: &Pager<T>) -> StreamEnd {
        loop {
            let page = tokio::select! {
                biased;
                () = self.sink.cancel.cancelled() => return StreamEnd::Cancelled,
                () = self.sink.tx.closed() => return StreamEnd::Closed,
                page = pager.read(self.range.clone()) => page,
            };
            let KeyPage { keys, more } = match page {
                Ok(page) => page,
                Err(e) => return StreamEnd::Failed(e),
            };

            let mut last = None;
            for key in keys {
                let name = String::from_utf8_lossy(&key).into_owned();
                if let Err(end) = self.sink.emit(name).await {
                    return end;
                }
                last = Some(key);
            }
            match last {
                Some(key) if more => self.range.after = Some(key),
                _ => return StreamEnd::Exhausted,
            }
        }
    }
}

/// A live, ordered sequence of keys read out of a transaction.
///
/// Keys arrive in ascending byte order. The transaction behind the stream
/// stays open until the stream is drained, cancelled, dropped or times out.
/// Once the [`CancelSignal`] fires the stream yields nothing more, including
/// keys already buffered.
#[derive(Debug)]
pub struct KeyStream {
    rx: mpsc::Receiver<String>,
    cancel: CancelSignal,
    end: Option<oneshot::Receiver<StreamEnd>>,
}

impl KeyStream {
    /// The next key, or `None` once the stream has ended.
    pub async fn next_key(&mut self) -> Option<String> {
        std::future::poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await
    }

    /// Stop reading and wait for the scan to report how the stream ended.
    ///
    /// Keys not yet read are discarded. A stream finished before it was
    /// drained reports [`StreamEnd::Closed`] unless it had already ended for
    /// another reason.
    pub async fn finish(mut self) -> StreamEnd {
        self.rx.close();
        match self.end.take() {
            Some(end) => end.await.unwrap_or(StreamEnd::Closed),
            None => StreamEnd::Closed,
        }
    }
}

impl Stream for KeyStream {
    type Item = String;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.cancel.is_cancelled() {
            this.rx.close();
            return Poll::Ready(None);
        }
        this.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bucketkv_storage::backends::RedbEngine;
    use bucketkv_storage::StorageEngine;

    use super::*;
    use crate::scope::{self, TxnScope};

    fn engine_with(keys: &[&str]) -> RedbEngine {
        let engine = RedbEngine::in_memory().expect("failed to create engine");
        engine.create_bucket("b").expect("failed to create bucket");
        let mut tx = engine.begin_write().expect("failed to begin write");
        for key in keys {
            tx.put("b", key.as_bytes(), b"").expect("failed to put");
        }
        tx.commit().expect("failed to commit");
        engine
    }

    async fn scan(engine: RedbEngine, prefix: Option<&str>, config: StoreConfig) -> KeyStream {
        let (scan, stream) = KeyScan::new(prefix, CancelSignal::never(), &config);
        scope::start_scan(&TxnScope::Implicit, &Arc::new(engine), &Arc::from("b"), scan)
            .await
            .expect("failed to start scan");
        stream
    }

    #[test]
    fn test_read_page_resumes_after_last_key() {
        let engine = engine_with(&["a", "ba", "bb", "bc", "c"]);
        let mut tx = engine.begin_read().expect("failed to begin read");
        let bucket = Bucket::resolve(&mut tx, "b").expect("failed to resolve");

        let mut range = ScanRange::new(Some("b"), 2);
        let page = range.read_page(&bucket).expect("failed to read page");
        assert_eq!(page.keys, vec![b"ba".to_vec(), b"bb".to_vec()]);
        assert!(page.more);

        range.after = Some(b"bb".to_vec());
        let page = range.read_page(&bucket).expect("failed to read page");
        // "c" is read but falls outside the prefix
        assert_eq!(page.keys, vec![b"bc".to_vec()]);
        assert!(!page.more);

        let page = ScanRange::new(Some("z"), 2).read_page(&bucket).expect("failed to read page");
        assert!(page.keys.is_empty());
        assert!(!page.more);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_prefix_scan_stops_at_prefix_end() {
        let engine = engine_with(&["a", "ba", "bb", "c"]);
        let config = StoreConfig::new().stream_page_size(1);
        let mut stream = scan(engine, Some("b"), config).await;

        assert_eq!(stream.next_key().await.as_deref(), Some("ba"));
        assert_eq!(stream.next_key().await.as_deref(), Some("bb"));
        assert_eq!(stream.next_key().await, None);
        assert!(stream.finish().await.is_exhausted());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stalled_consumer_times_out() {
        let engine = engine_with(&["a", "b", "c"]);
        let config = StoreConfig::new()
            .stream_buffer(1)
            .stream_send_timeout(Some(Duration::from_millis(20)));
        let mut stream = scan(engine, None, config).await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        // The buffered key is still delivered, then the channel is closed.
        assert_eq!(stream.next_key().await.as_deref(), Some("a"));
        assert_eq!(stream.next_key().await, None);
        assert!(matches!(stream.finish().await, StreamEnd::TimedOut));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_finish_early_reports_closed() {
        let engine = engine_with(&["a", "b", "c", "d"]);
        let config = StoreConfig::new().stream_buffer(1).stream_send_timeout(None);
        let mut stream = scan(engine, None, config).await;

        assert_eq!(stream.next_key().await.as_deref(), Some("a"));
        assert!(matches!(stream.finish().await, StreamEnd::Closed));
    }
}
