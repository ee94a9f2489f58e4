//! Cancellation signals for key streams.
//!
//! A [`CancelSignal`] is a `watch` receiver on a boolean flag, the same shape
//! background tasks use for shutdown. The flag only ever moves from `false`
//! to `true`.

use tokio::sync::watch;

/// Triggers the [`CancelSignal`]s created alongside it.
#[derive(Debug)]
pub struct Canceller {
    tx: watch::Sender<bool>,
}

impl Canceller {
    /// Cancel every stream watching this canceller's signal.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// An optional, externally owned stop condition for a key stream.
///
/// The default signal never fires. Dropping the [`Canceller`] without
/// cancelling leaves the signal unfired for good.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    /// Create a linked canceller and signal.
    #[must_use]
    pub fn channel() -> (Canceller, Self) {
        let (tx, rx) = watch::channel(false);
        (Canceller { tx }, Self { rx: Some(rx) })
    }

    /// A signal that never fires.
    #[must_use]
    pub const fn never() -> Self {
        Self { rx: None }
    }

    /// Whether the signal has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Wait until the signal fires. Pending forever if it never can.
    pub async fn cancelled(&self) {
        let Some(rx) = &self.rx else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender gone without firing.
                return std::future::pending().await;
            }
        }
    }
}

impl From<watch::Receiver<bool>> for CancelSignal {
    fn from(rx: watch::Receiver<bool>) -> Self {
        Self { rx: Some(rx) }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_cancel_fires() {
        let (canceller, signal) = CancelSignal::channel();
        assert!(!signal.is_cancelled());

        let waiter = tokio::spawn({
            let signal = signal.clone();
            async move { signal.cancelled().await }
        });
        canceller.cancel();

        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("signal should fire")
            .expect("waiter panicked");
        assert!(signal.is_cancelled());
        assert!(canceller.is_cancelled());
    }

    #[tokio::test]
    async fn test_never_and_dropped_sender_stay_pending() {
        let never = CancelSignal::never();
        assert!(!never.is_cancelled());
        let waited = tokio::time::timeout(Duration::from_millis(20), never.cancelled()).await;
        assert!(waited.is_err());

        let (canceller, signal) = CancelSignal::channel();
        drop(canceller);
        assert!(!signal.is_cancelled());
        let waited = tokio::time::timeout(Duration::from_millis(20), signal.cancelled()).await;
        assert!(waited.is_err());
    }

    #[test]
    fn test_from_shutdown_receiver() {
        let (tx, rx) = watch::channel(false);
        let signal = CancelSignal::from(rx);
        tx.send_replace(true);
        assert!(signal.is_cancelled());
    }
}
