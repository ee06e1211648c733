//! Bounding asynchronous work by a timeout.
//!
//! [`TimeoutGuard`] races an operation against a timer and an optional
//! caller-owned [`CancellationSignal`], and reports which one finished first
//! as a [`TimeoutOutcome`]. It never retries, and it never cancels the
//! caller's signal: on expiry or cancellation it only fires an internal
//! signal linked to the operation.

use crate::cancel::{CancelSource, CancellationSignal};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, trace};

/// What happens to an operation that lost the race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExpiryPolicy {
    /// Drop the operation as soon as the outcome is known.
    #[default]
    Abandon,
    /// Spawn the operation onto the current tokio runtime and let it run to
    /// completion in the background. Its linked signal is already fired, so
    /// a cooperating operation can wind down early.
    Detach,
}

/// The single terminal result of a guarded run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeoutOutcome<T> {
    Completed(T),
    TimedOut,
    Cancelled,
}

impl<T> TimeoutOutcome<T> {
    /// Convert into a `Result`, mapping the losing outcomes to
    /// [`Error::TimedOut`] and [`Error::Cancelled`]. `timeout_ms` is the
    /// timeout the operation was run with.
    pub fn into_result(self, timeout_ms: u32) -> Result<T> {
        match self {
            TimeoutOutcome::Completed(value) => Ok(value),
            TimeoutOutcome::TimedOut => Err(Error::TimedOut { timeout_ms }),
            TimeoutOutcome::Cancelled => Err(Error::Cancelled),
        }
    }
}

/// Runs operations under a timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeoutGuard {
    on_expiry: ExpiryPolicy,
}

impl TimeoutGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set what happens to operations that time out or are cancelled
    pub fn with_expiry_policy(mut self, policy: ExpiryPolicy) -> Self {
        self.on_expiry = policy;
        self
    }

    /// Run `operation`, giving up after `timeout_ms` milliseconds or when
    /// `cancel` fires, whichever comes first.
    ///
    /// - A `cancel` signal that is already cancelled resolves to
    ///   [`TimeoutOutcome::Cancelled`] immediately, without polling the
    ///   operation.
    /// - A timeout of `0` expires at once unless the operation is ready on
    ///   its first poll.
    /// - If cancellation and expiry are both ready, cancellation wins.
    pub async fn run<F>(
        &self,
        operation: F,
        timeout_ms: u32,
        cancel: Option<&CancellationSignal>,
    ) -> TimeoutOutcome<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.run_linked(move |_| operation, timeout_ms, cancel).await
    }

    /// Like [`run`](Self::run), but the operation is built from a signal that
    /// fires when the guard gives up on it, so it can stop cooperatively.
    ///
    /// The linked signal is released when the operation completes; it never
    /// fires in that case.
    pub async fn run_linked<Op, F>(
        &self,
        op: Op,
        timeout_ms: u32,
        cancel: Option<&CancellationSignal>,
    ) -> TimeoutOutcome<F::Output>
    where
        Op: FnOnce(CancellationSignal) -> F,
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if cancel.is_some_and(CancellationSignal::is_cancelled) {
            trace!("Cancelled before start");
            return TimeoutOutcome::Cancelled;
        }

        let linked = CancelSource::new();
        let mut operation = Box::pin(op(linked.signal()));

        let timeout = Duration::from_millis(u64::from(timeout_ms));
        let expiry = async move {
            if !timeout.is_zero() {
                sleep(timeout).await;
            }
        };
        let external = async move {
            match cancel {
                Some(signal) => signal.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = external => TimeoutOutcome::Cancelled,
            output = &mut operation => return TimeoutOutcome::Completed(output),
            _ = expiry => TimeoutOutcome::TimedOut,
        };

        linked.cancel();
        match self.on_expiry {
            ExpiryPolicy::Abandon => {
                trace!("Abandoning operation after {}", outcome_name(&outcome));
                drop(operation);
            }
            ExpiryPolicy::Detach => {
                debug!("Detaching operation after {}", outcome_name(&outcome));
                tokio::spawn(async move {
                    operation.await;
                    trace!("Detached operation finished");
                });
            }
        }
        outcome
    }
}

fn outcome_name<T>(outcome: &TimeoutOutcome<T>) -> &'static str {
    match outcome {
        TimeoutOutcome::Completed(_) => "completion",
        TimeoutOutcome::TimedOut => "timeout",
        TimeoutOutcome::Cancelled => "cancellation",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::oneshot;
    use tokio::time::Instant;

    async fn finishes_after(ms: u64) -> &'static str {
        sleep(Duration::from_millis(ms)).await;
        "done"
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_within_timeout() {
        let guard = TimeoutGuard::new();
        let outcome = guard.run(finishes_after(100), 150, None).await;
        assert_eq!(outcome, TimeoutOutcome::Completed("done"));

        let outcome = guard.run(finishes_after(100), 101, None).await;
        assert_eq!(outcome, TimeoutOutcome::Completed("done"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let guard = TimeoutGuard::new();
        let start = Instant::now();
        let outcome = guard.run(finishes_after(100), 50, None).await;
        assert_eq!(outcome, TimeoutOutcome::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(start.elapsed() < Duration::from_millis(100));

        let outcome = guard.run(finishes_after(100), 99, None).await;
        assert_eq!(outcome, TimeoutOutcome::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled_resolves_immediately() {
        let guard = TimeoutGuard::new();
        let source = CancelSource::new();
        source.cancel();
        let signal = source.signal();

        let polled = Arc::new(AtomicBool::new(false));
        let polled_op = polled.clone();
        let start = Instant::now();
        let outcome = guard
            .run(
                async move {
                    polled_op.store(true, Ordering::SeqCst);
                    finishes_after(10_000).await
                },
                60_000,
                Some(&signal),
            )
            .await;

        assert_eq!(outcome, TimeoutOutcome::Cancelled);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(!polled.load(Ordering::SeqCst));

        // Even an operation that is already finished loses to a prior cancel
        let outcome = guard.run(async { 1 }, 0, Some(&signal)).await;
        assert_eq!(outcome, TimeoutOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_running() {
        let guard = TimeoutGuard::new();
        let source = CancelSource::new();
        let signal = source.signal();

        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            source.cancel();
        });

        let start = Instant::now();
        let outcome = guard.run(finishes_after(1_000), 500, Some(&signal)).await;
        assert_eq!(outcome, TimeoutOutcome::Cancelled);
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert!(start.elapsed() < Duration::from_millis(500));
        // The caller's signal is only observed, never reset
        assert!(signal.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_does_not_cancel_caller_signal() {
        let guard = TimeoutGuard::new();
        let source = CancelSource::new();
        let signal = source.signal();

        let outcome = guard.run(finishes_after(100), 10, Some(&signal)).await;
        assert_eq!(outcome, TimeoutOutcome::TimedOut);
        assert!(!source.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout() {
        let guard = TimeoutGuard::new();
        let outcome = guard.run(async { 7 }, 0, None).await;
        assert_eq!(outcome, TimeoutOutcome::Completed(7));

        let outcome = guard.run(finishes_after(1), 0, None).await;
        assert_eq!(outcome, TimeoutOutcome::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_linked_signal_fires_on_timeout() {
        let guard = TimeoutGuard::new().with_expiry_policy(ExpiryPolicy::Detach);
        let (tx, rx) = oneshot::channel();

        let outcome = guard
            .run_linked(
                |linked| async move {
                    linked.cancelled().await;
                    let _ = tx.send("stopped");
                },
                25,
                None,
            )
            .await;

        assert_eq!(outcome, TimeoutOutcome::TimedOut);
        assert_eq!(rx.await.unwrap(), "stopped");
    }

    #[tokio::test(start_paused = true)]
    async fn test_linked_signal_quiet_on_completion() {
        let guard = TimeoutGuard::new();
        let (tx, rx) = oneshot::channel();

        let outcome = guard
            .run_linked(
                |linked| async move {
                    let _ = tx.send(linked.clone());
                    5
                },
                25,
                None,
            )
            .await;

        assert_eq!(outcome, TimeoutOutcome::Completed(5));
        let linked = rx.await.unwrap();
        assert!(!linked.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_detached_operation_finishes_in_background() {
        let guard = TimeoutGuard::new().with_expiry_policy(ExpiryPolicy::Detach);
        let (tx, rx) = oneshot::channel();

        let outcome = guard
            .run(
                async move {
                    sleep(Duration::from_millis(100)).await;
                    let _ = tx.send(());
                },
                10,
                None,
            )
            .await;

        assert_eq!(outcome, TimeoutOutcome::TimedOut);
        assert!(rx.await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_operation_is_dropped() {
        let guard = TimeoutGuard::new();
        let (tx, rx) = oneshot::channel::<()>();

        let outcome = guard
            .run(
                async move {
                    sleep(Duration::from_millis(100)).await;
                    let _ = tx.send(());
                },
                10,
                None,
            )
            .await;

        assert_eq!(outcome, TimeoutOutcome::TimedOut);
        // The sender was dropped with the operation
        assert!(rx.await.is_err());
    }

    #[test]
    fn test_into_result() {
        assert_eq!(TimeoutOutcome::Completed(3).into_result(100).unwrap(), 3);

        let err = TimeoutOutcome::<()>::TimedOut.into_result(250).unwrap_err();
        assert!(matches!(err, Error::TimedOut { timeout_ms: 250 }));
        assert_eq!(err.to_string(), "Operation timed out after 250ms");

        assert!(matches!(
            TimeoutOutcome::<()>::Cancelled.into_result(250),
            Err(Error::Cancelled)
        ));
    }
}
