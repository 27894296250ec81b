//! Bounded-time polling of network state.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::{sync::watch, time::Instant};

/// Default interval between two evaluations of a condition.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shortest interval a poll loop will sleep for.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Why a wait ended without a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    #[error("condition not met within {limit:?} ({attempts} attempts)")]
    Timeout { limit: Duration, attempts: u32 },
    #[error("wait was cancelled")]
    Cancelled,
}

/// Options for [`ConditionPoller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Pause between two evaluations of the condition.
    pub interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl WaitOptions {
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Cancels every pending and future wait of the poller it was taken from.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }
}

/// Repeatedly evaluates a condition until it yields a value or a deadline elapses.
#[derive(Debug, Clone)]
pub struct ConditionPoller {
    options: WaitOptions,
    cancel: Arc<watch::Sender<bool>>,
}

impl Default for ConditionPoller {
    fn default() -> Self {
        Self::new(WaitOptions::default())
    }
}

impl ConditionPoller {
    pub fn new(options: WaitOptions) -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            options,
            cancel: Arc::new(sender),
        }
    }

    pub fn options(&self) -> WaitOptions {
        self.options
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            sender: self.cancel.clone(),
        }
    }

    /// Wait until `condition` yields `Some(value)` or `time_limit` elapses.
    ///
    /// The condition is evaluated once right away, so a condition that already holds costs a
    /// single evaluation and no sleep. Errors returned by the condition count as "not yet" and
    /// are logged at trace level. An evaluation still pending at the deadline is dropped. Once
    /// this returns, the condition is never invoked again.
    pub async fn wait_for<T, F, Fut>(
        &self,
        mut condition: F,
        time_limit: Duration,
    ) -> Result<T, WaitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<Option<T>>>,
    {
        let mut cancelled = self.cancel.subscribe();
        let already_cancelled = *cancelled.borrow_and_update();
        if already_cancelled {
            return Err(WaitError::Cancelled);
        }

        let start = Instant::now();
        let deadline = start + time_limit;
        let interval = self.options.interval.max(MIN_POLL_INTERVAL);
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            let evaluation = tokio::select! {
                biased;
                _ = wait_cancelled(&mut cancelled) => return Err(WaitError::Cancelled),
                evaluation = condition() => evaluation,
                _ = tokio::time::sleep_until(deadline) => {
                    tracing::trace!(attempt = attempts, "Condition check still pending at deadline");
                    return Err(WaitError::Timeout {
                        limit: time_limit,
                        attempts,
                    });
                }
            };

            match evaluation {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(e) => {
                    tracing::trace!(error = %e, attempt = attempts, "Condition check failed, retrying...");
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= time_limit {
                return Err(WaitError::Timeout {
                    limit: time_limit,
                    attempts,
                });
            }

            let pause = interval.min(time_limit - elapsed);
            tokio::select! {
                biased;
                _ = wait_cancelled(&mut cancelled) => return Err(WaitError::Cancelled),
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }
}

/// Wait for `condition` with a fresh poller.
pub async fn wait_for<T, F, Fut>(
    condition: F,
    time_limit: Duration,
    options: WaitOptions,
) -> Result<T, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<Option<T>>>,
{
    ConditionPoller::new(options)
        .wait_for(condition, time_limit)
        .await
}

/// Resolves once the flag flips to `true`; never resolves if the sender is gone.
async fn wait_cancelled(receiver: &mut watch::Receiver<bool>) {
    let sender_gone = receiver.wait_for(|cancelled| *cancelled).await.is_err();
    if sender_gone {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn counting_condition(
        counter: &Arc<AtomicU32>,
        ready_at: Option<u32>,
    ) -> impl FnMut() -> std::future::Ready<anyhow::Result<Option<u32>>> + use<> {
        let counter = counter.clone();
        move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            let ready = ready_at.is_some_and(|at| n >= at);
            std::future::ready(Ok(ready.then_some(n)))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_satisfied_condition_returns_without_sleeping() {
        let counter = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let value = ConditionPoller::default()
            .wait_for(counting_condition(&counter, Some(1)), Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(value, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_condition_met_after_a_few_attempts() {
        let counter = Arc::new(AtomicU32::new(0));
        let options = WaitOptions::default().interval(Duration::from_millis(50));

        let value = wait_for(
            counting_condition(&counter, Some(3)),
            Duration::from_secs(1),
            options,
        )
        .await
        .unwrap();

        assert_eq!(value, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_after_limit_and_no_late_evaluation() {
        let counter = Arc::new(AtomicU32::new(0));
        let limit = Duration::from_secs(1);
        let start = Instant::now();

        let err = ConditionPoller::new(WaitOptions::default())
            .wait_for(counting_condition(&counter, None), limit)
            .await
            .unwrap_err();

        assert!(start.elapsed() >= limit);
        let WaitError::Timeout { attempts, .. } = err else {
            panic!("expected a timeout, got {err:?}");
        };
        assert_eq!(attempts, counter.load(Ordering::SeqCst));

        let evaluations = counter.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.load(Ordering::SeqCst), evaluations);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_evaluation_times_out_at_limit() {
        let counter = Arc::new(AtomicU32::new(0));
        let calls = counter.clone();
        let limit = Duration::from_secs(1);
        let start = Instant::now();

        let err = ConditionPoller::default()
            .wait_for(
                move || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        anyhow::Ok(Some(()))
                    }
                },
                limit,
            )
            .await
            .unwrap_err();

        assert_eq!(err, WaitError::Timeout { limit, attempts: 1 });
        assert_eq!(start.elapsed(), limit);

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_are_retried() {
        let counter = Arc::new(AtomicU32::new(0));
        let calls = counter.clone();

        let value = ConditionPoller::default()
            .wait_for(
                move || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            anyhow::bail!("registry not reachable");
                        }
                        Ok(Some("ready"))
                    }
                },
                Duration::from_secs(1),
            )
            .await
            .unwrap();

        assert_eq!(value, "ready");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_polling() {
        let counter = Arc::new(AtomicU32::new(0));
        let poller = ConditionPoller::default();
        let handle = poller.cancel_handle();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            handle.cancel();
        });

        let err = poller
            .wait_for(counting_condition(&counter, None), Duration::from_secs(10))
            .await
            .unwrap_err();
        assert_eq!(err, WaitError::Cancelled);

        let evaluations = counter.load(Ordering::SeqCst);
        assert!(evaluations <= 4);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(counter.load(Ordering::SeqCst), evaluations);

        assert!(poller.cancel_handle().is_cancelled());
        let again = poller
            .wait_for(counting_condition(&counter, Some(1)), Duration::from_secs(1))
            .await;
        assert_eq!(again, Err(WaitError::Cancelled));
        assert_eq!(counter.load(Ordering::SeqCst), evaluations);
    }
}
