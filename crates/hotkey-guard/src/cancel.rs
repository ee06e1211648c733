//! Caller-owned cancellation.
//!
//! A [`CancelSource`] is held by whoever decides when work should stop; any
//! number of read-only [`CancellationSignal`]s can be handed out from it.
//! Cancellation is advisory: work only stops if it observes the signal.

use tokio::sync::watch;

/// The owning side of a cancellation signal.
#[derive(Debug)]
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSource {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Hand out a read-only view of this source.
    pub fn signal(&self) -> CancellationSignal {
        CancellationSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Request cancellation. Calling this more than once has no further effect.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// A read-only handle that observes a [`CancelSource`].
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    rx: watch::Receiver<bool>,
}

impl CancellationSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the source is cancelled.
    ///
    /// If the source is dropped without ever being cancelled this never
    /// resolves.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn test_cancel_is_visible_to_every_signal() {
        let source = CancelSource::new();
        let a = source.signal();
        let b = a.clone();
        assert!(!a.is_cancelled());

        source.cancel();
        source.cancel();
        assert!(source.is_cancelled());
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
        assert!(source.signal().is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_after_cancel() {
        let source = CancelSource::new();
        let signal = source.signal();
        let waiter = tokio::spawn(async move { signal.cancelled().await });

        source.cancel();
        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("signal should resolve")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_source_never_cancels() {
        let source = CancelSource::new();
        let signal = source.signal();
        drop(source);

        assert!(!signal.is_cancelled());
        let waited = timeout(Duration::from_secs(5), signal.cancelled()).await;
        assert!(waited.is_err());
    }
}
