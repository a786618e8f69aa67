//! Bounded concurrent processing of several review requests.

use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::{ReviewError, ReviewResult};

use super::reply::ResponseContent;
use super::session::{ReviewContext, ReviewSession};

/// One prompt to run against a change.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewRequest {
    #[serde(flatten)]
    pub context: ReviewContext,
    pub prompt: String,
}

pub struct ReviewPool {
    session: ReviewSession,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl ReviewPool {
    pub fn new(session: ReviewSession, max_workers: usize, cancel: CancellationToken) -> Self {
        Self {
            session,
            semaphore: Arc::new(Semaphore::new(max_workers.max(1))),
            cancel,
        }
    }

    /// Run every request with at most `max_workers` turns in flight.
    ///
    /// Results line up with `requests`. A request that has not started when
    /// the token fires resolves to [`ReviewError::Cancelled`].
    pub async fn run_all(&self, requests: Vec<ReviewRequest>) -> Vec<ReviewResult<ResponseContent>> {
        let total = requests.len();
        info!("🚀 Processing {} review request(s)", total);

        let mut tasks = JoinSet::new();
        for (index, request) in requests.into_iter().enumerate() {
            let session = self.session.clone();
            let semaphore = self.semaphore.clone();
            let cancel = self.cancel.clone();

            tasks.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return (index, Err(ReviewError::Cancelled)),
                    permit = semaphore.acquire_owned() => permit,
                };
                let _permit = match permit {
                    Ok(permit) => permit,
                    Err(_) => return (index, Err(ReviewError::Cancelled)),
                };

                debug!("Review {} started for change {}", index, request.context.change_id);
                let result = session
                    .ask(&request.context, &request.prompt, &cancel)
                    .await;
                (index, result)
            });
        }

        let mut results: Vec<ReviewResult<ResponseContent>> = (0..total)
            .map(|_| {
                Err(ReviewError::InvalidState(
                    "review task did not complete".to_string(),
                ))
            })
            .collect();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = result,
                Err(e) => error!("❌ Review task aborted: {}", e),
            }
        }

        let failed = results.iter().filter(|r| r.is_err()).count();
        info!(
            "✅ Finished {} review request(s), {} failed",
            total, failed
        );
        results
    }
}
