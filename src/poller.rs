//! Bounded-time polling of status-bearing remote resources.
//!
//! A [`Poller`] keeps re-fetching a resource while its status is pending
//! (`queued`, `in_progress`, `cancelling`, or not observed yet) and gives up
//! with [`ReviewError::ConnectionTimeout`] once a single `poll` call has
//! waited for the configured timeout. The sleep before each fetch is clipped
//! to the remaining budget, so the timeout fires on time even mid-interval.
//! Request count and elapsed time accumulate across calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::api::{FileBatch, ResourceStatus, Run};
use crate::error::{ReviewError, ReviewResult};

/// A remote resource that carries a lifecycle status.
pub trait Polled {
    fn status(&self) -> Option<&ResourceStatus>;
}

impl Polled for Run {
    fn status(&self) -> Option<&ResourceStatus> {
        self.status.as_ref()
    }
}

impl Polled for FileBatch {
    fn status(&self) -> Option<&ResourceStatus> {
        self.status.as_ref()
    }
}

fn is_pending(status: Option<&ResourceStatus>) -> bool {
    status.map_or(true, ResourceStatus::is_pending)
}

#[derive(Debug, Clone)]
pub struct Poller {
    interval: Duration,
    timeout: Duration,
    poll_count: usize,
    elapsed: Duration,
}

impl Poller {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            poll_count: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Total fetches issued across every `poll` call on this poller.
    pub fn poll_count(&self) -> usize {
        self.poll_count
    }

    /// Total time spent waiting across every `poll` call on this poller.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Poll until the status leaves the pending set.
    ///
    /// Returns the most recent fetch, or `None` when `initial_status` was
    /// already settled and nothing had to be fetched.
    pub async fn poll<T, F, Fut>(
        &mut self,
        initial_status: Option<&ResourceStatus>,
        mut fetch: F,
    ) -> ReviewResult<Option<T>>
    where
        T: Polled,
        F: FnMut() -> Fut,
        Fut: Future<Output = ReviewResult<T>>,
    {
        let started = Instant::now();
        let previously_elapsed = self.elapsed;
        let mut latest: Option<T> = None;
        let mut pending = is_pending(initial_status);

        while pending {
            let waited = started.elapsed();
            if waited >= self.timeout {
                return Err(self.timed_out(previously_elapsed, waited));
            }

            sleep(self.interval.min(self.timeout - waited)).await;

            let waited = started.elapsed();
            if waited >= self.timeout {
                return Err(self.timed_out(previously_elapsed, waited));
            }

            let fetched = fetch().await;
            self.poll_count += 1;
            self.elapsed = previously_elapsed + started.elapsed();
            let fetched = fetched?;

            // A response that lands after the deadline does not count.
            let waited = started.elapsed();
            if waited >= self.timeout {
                return Err(self.timed_out(previously_elapsed, waited));
            }

            debug!(
                "Poll #{}: status {} after {:?}",
                self.poll_count,
                fetched.status().map_or("unset", ResourceStatus::as_str),
                started.elapsed()
            );

            pending = is_pending(fetched.status());
            latest = Some(fetched);
        }

        self.elapsed = previously_elapsed + started.elapsed();
        debug!(
            "Polling settled after {} request(s) in {:?}",
            self.poll_count, self.elapsed
        );
        Ok(latest)
    }

    /// Poll starting from an already-fetched resource; returns the settled one.
    pub async fn poll_resource<T, F, Fut>(&mut self, resource: T, fetch: F) -> ReviewResult<T>
    where
        T: Polled,
        F: FnMut() -> Fut,
        Fut: Future<Output = ReviewResult<T>>,
    {
        let initial = resource.status().cloned();
        let latest = self.poll(initial.as_ref(), fetch).await?;
        Ok(latest.unwrap_or(resource))
    }

    fn timed_out(&mut self, previously_elapsed: Duration, waited: Duration) -> ReviewError {
        self.elapsed = previously_elapsed + waited;
        ReviewError::ConnectionTimeout {
            elapsed: waited,
            polls: self.poll_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn run_with(status: Option<ResourceStatus>) -> Run {
        Run {
            id: "run_1".to_string(),
            status,
            required_action: None,
            last_error: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_initial_status_does_not_fetch() {
        let mut poller = Poller::new(Duration::from_secs(1), Duration::from_secs(10));
        let counter = AtomicUsize::new(0);
        let fetched = &counter;

        let result: Option<Run> = poller
            .poll(Some(&ResourceStatus::Completed), move || async move {
                fetched.fetch_add(1, Ordering::SeqCst);
                Ok(run_with(Some(ResourceStatus::Completed)))
            })
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(poller.poll_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_status_leaves_pending_set() {
        let mut poller = Poller::new(Duration::from_secs(1), Duration::from_secs(60));
        let statuses = [
            ResourceStatus::InProgress,
            ResourceStatus::Cancelling,
            ResourceStatus::RequiresAction,
        ];
        let calls = AtomicUsize::new(0);

        let run = poller
            .poll_resource(run_with(None), || {
                let i = calls.fetch_add(1, Ordering::SeqCst);
                let status = statuses[i].clone();
                async move { Ok(run_with(Some(status))) }
            })
            .await
            .unwrap();

        assert_eq!(run.status, Some(ResourceStatus::RequiresAction));
        assert_eq!(poller.poll_count(), 3);
        assert_eq!(poller.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_when_elapsed_reaches_timeout() {
        let mut poller = Poller::new(Duration::from_secs(1), Duration::from_secs(3));

        let err = poller
            .poll_resource(run_with(Some(ResourceStatus::Queued)), || async {
                Ok(run_with(Some(ResourceStatus::InProgress)))
            })
            .await
            .unwrap_err();

        match err {
            ReviewError::ConnectionTimeout { elapsed, polls } => {
                assert_eq!(elapsed, Duration::from_secs(3));
                assert_eq!(polls, 2);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_settled_response_still_times_out() {
        let mut poller = Poller::new(Duration::from_secs(1), Duration::from_secs(3));

        let err = poller
            .poll_resource(run_with(Some(ResourceStatus::Queued)), || async {
                sleep(Duration::from_secs(5)).await;
                Ok(run_with(Some(ResourceStatus::Completed)))
            })
            .await
            .unwrap_err();

        match err {
            ReviewError::ConnectionTimeout { elapsed, polls } => {
                assert_eq!(elapsed, Duration::from_secs(6));
                assert_eq!(polls, 1);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(poller.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_is_clipped_to_remaining_budget() {
        let mut poller = Poller::new(Duration::from_secs(10), Duration::from_millis(2500));

        let err = poller
            .poll_resource(run_with(None), || async {
                Ok(run_with(Some(ResourceStatus::Queued)))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ReviewError::ConnectionTimeout { polls: 0, .. }));
        assert_eq!(poller.elapsed(), Duration::from_millis(2500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_counters_are_cumulative_across_polls() {
        let mut poller = Poller::new(Duration::from_secs(1), Duration::from_secs(30));

        for _ in 0..2 {
            poller
                .poll_resource(run_with(None), || async {
                    Ok(run_with(Some(ResourceStatus::Completed)))
                })
                .await
                .unwrap();
        }

        assert_eq!(poller.poll_count(), 2);
        assert_eq!(poller.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_error_propagates() {
        let mut poller = Poller::new(Duration::from_secs(1), Duration::from_secs(30));

        let err = poller
            .poll_resource(run_with(None), || async {
                Err::<Run, _>(ReviewError::connection("boom"))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ReviewError::ConnectionFailure { .. }));
        assert_eq!(poller.poll_count(), 1);
    }
}
