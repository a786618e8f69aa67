use rand::Rng;
use reqwest::StatusCode;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::error::{ReviewError, ReviewResult};

/// Transport retry schedule: 3 retries with exponential backoff from 1s, plus jitter.
const RETRY_BASE_DELAY_SECS: u64 = 1;
const MAX_RETRIES: usize = 3;
const RETRY_JITTER_DIVISOR: u128 = 4; // + up to 25% jitter

fn is_retriable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn is_retriable_send_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

/// Which failed attempts a request may be sent again after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum RetryPolicy {
    /// Resend on retriable statuses and on connect or timeout errors.
    Idempotent,
    /// Resend only when the server answered with a retriable status; a lost
    /// response may mean the request was applied.
    StatusOnly,
}

impl RetryPolicy {
    fn retries_send_error(self, err: &reqwest::Error) -> bool {
        self == RetryPolicy::Idempotent && is_retriable_send_error(err)
    }
}

fn retry_delay(attempt: usize) -> Duration {
    let multiplier = 1u64.checked_shl(attempt as u32).unwrap_or(u64::MAX);
    let base = Duration::from_secs(RETRY_BASE_DELAY_SECS.saturating_mul(multiplier));

    let max_jitter_ms = base.as_millis() / RETRY_JITTER_DIVISOR;
    if max_jitter_ms == 0 {
        return base;
    }
    let max_jitter_ms = std::cmp::min(max_jitter_ms, u128::from(u64::MAX)) as u64;
    base + Duration::from_millis(rand::thread_rng().gen_range(0..=max_jitter_ms))
}

/// Send a request, rebuilding it for every attempt.
///
/// Retriable HTTP statuses are retried, and so are connect/timeout errors
/// when `policy` allows it; any other outcome (including a non-retriable
/// error status) is handed back to the caller on the first attempt.
pub(super) async fn send_with_retry(
    policy: RetryPolicy,
    mut make_request: impl FnMut() -> reqwest::RequestBuilder,
) -> ReviewResult<reqwest::Response> {
    let max_attempts = MAX_RETRIES + 1;
    let mut attempt = 0;

    loop {
        let last_attempt = attempt + 1 >= max_attempts;

        match make_request().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() || !is_retriable_status(status) || last_attempt {
                    return Ok(response);
                }

                let delay = retry_delay(attempt);
                debug!(
                    "HTTP {}; retrying in {:?} (attempt {}/{})",
                    status,
                    delay,
                    attempt + 1,
                    max_attempts
                );
                let _ = response.bytes().await;
                sleep(delay).await;
            }
            Err(err) => {
                if !policy.retries_send_error(&err) || last_attempt {
                    return Err(ReviewError::connection_caused_by(
                        format!("HTTP request failed after {} attempt(s)", attempt + 1),
                        err,
                    ));
                }

                let delay = retry_delay(attempt);
                debug!(
                    "HTTP request error: {}; retrying in {:?} (attempt {}/{})",
                    err,
                    delay,
                    attempt + 1,
                    max_attempts
                );
                sleep(delay).await;
            }
        }

        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retriable_statuses() {
        assert!(is_retriable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retriable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retriable_status(StatusCode::BAD_REQUEST));
        assert!(!is_retriable_status(StatusCode::UNAUTHORIZED));
    }

    // Nothing listens on port 1, so every send fails to connect.
    const UNREACHABLE_URL: &str = "http://127.0.0.1:1/v1/threads";

    #[tokio::test(start_paused = true)]
    async fn test_status_only_policy_does_not_resend_after_send_error() {
        let client = reqwest::Client::new();
        let mut attempts = 0;

        let result = send_with_retry(RetryPolicy::StatusOnly, || {
            attempts += 1;
            client.post(UNREACHABLE_URL)
        })
        .await;

        assert!(matches!(result, Err(ReviewError::ConnectionFailure { .. })));
        assert_eq!(attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idempotent_policy_resends_after_send_error() {
        let client = reqwest::Client::new();
        let mut attempts = 0;

        let result = send_with_retry(RetryPolicy::Idempotent, || {
            attempts += 1;
            client.get(UNREACHABLE_URL)
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts, MAX_RETRIES + 1);
    }

    #[test]
    fn test_retry_delay_grows_with_bounded_jitter() {
        for attempt in 0..3 {
            let base = Duration::from_secs(1 << attempt);
            let delay = retry_delay(attempt);
            assert!(delay >= base);
            assert!(delay <= base + base / 4);
        }
    }
}
