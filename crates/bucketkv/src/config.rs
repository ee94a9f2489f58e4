//! Store configuration.

use std::time::Duration;

/// Default capacity of a key stream's channel.
pub const DEFAULT_STREAM_BUFFER: usize = 16;

/// Default number of keys a stream reads from the transaction at a time.
pub const DEFAULT_STREAM_PAGE_SIZE: usize = 256;

/// Default time a stream worker waits for the consumer to take a key.
pub const DEFAULT_STREAM_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration options for a [`Store`](crate::Store).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Open every transaction read-only. Writes then fail with
    /// [`StorageError::ReadOnly`](bucketkv_storage::StorageError::ReadOnly).
    pub read_only: bool,

    /// Number of keys buffered between a stream worker and its consumer.
    pub stream_buffer: usize,

    /// Number of keys a stream reads per visit to the transaction. Other
    /// operations on the same transaction run between pages.
    pub stream_page_size: usize,

    /// How long a stream worker waits on a full channel before giving up and
    /// releasing its transaction. `None` waits until the consumer reads,
    /// drops the stream or cancels.
    pub stream_send_timeout: Option<Duration>,
}

impl StoreConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether the store is read-only.
    #[must_use]
    pub const fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Set the stream buffer size. Values below 1 are raised to 1.
    #[must_use]
    pub const fn stream_buffer(mut self, size: usize) -> Self {
        self.stream_buffer = if size == 0 { 1 } else { size };
        self
    }

    /// Set the stream page size. Values below 1 are raised to 1.
    #[must_use]
    pub const fn stream_page_size(mut self, size: usize) -> Self {
        self.stream_page_size = if size == 0 { 1 } else { size };
        self
    }

    /// Set the stream send timeout.
    #[must_use]
    pub const fn stream_send_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stream_send_timeout = timeout;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            read_only: false,
            stream_buffer: DEFAULT_STREAM_BUFFER,
            stream_page_size: DEFAULT_STREAM_PAGE_SIZE,
            stream_send_timeout: Some(DEFAULT_STREAM_SEND_TIMEOUT),
        }
    }
}
