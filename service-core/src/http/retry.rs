//! HTTP client retry utilities for calls to external APIs.
//!
//! Provides a retry policy value with exponential backoff, applied to
//! `reqwest` requests.

use rand::Rng;
use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};

/// Statuses that indicate a transient upstream condition.
pub const TRANSIENT_STATUSES: [StatusCode; 6] = [
    StatusCode::PAYLOAD_TOO_LARGE,
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Configuration for retry behavior.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Backoff before the second attempt.
    pub initial_backoff: Duration,
    /// Upper bound for any single backoff.
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Statuses worth another attempt. Anything else non-2xx fails at once.
    pub retryable_statuses: Vec<StatusCode>,
    /// Whether to add up to 25% random jitter to each backoff.
    pub add_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            retryable_statuses: TRANSIENT_STATUSES.to_vec(),
            add_jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the specified number of attempts.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// A single attempt; failures surface immediately.
    pub fn no_retry() -> Self {
        Self::with_max_attempts(1)
    }

    /// Backoff to wait after the given (1-based) failed attempt.
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let backoff =
            self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let backoff_ms = backoff.min(self.max_backoff.as_millis() as f64) as u64;

        let mut duration = Duration::from_millis(backoff_ms);
        if self.add_jitter && backoff_ms > 0 {
            let jitter = rand::thread_rng().gen_range(0..=backoff_ms / 4);
            duration += Duration::from_millis(jitter);
        }

        duration
    }

    pub fn is_retryable(&self, status: StatusCode) -> bool {
        self.retryable_statuses.contains(&status)
    }
}

#[derive(Debug, Error)]
pub enum RetryError {
    #[error("HTTP {status} from {path}")]
    Status { status: StatusCode, path: String },

    #[error("Request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },
}

impl RetryError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RetryError::Status { status, .. } => Some(*status),
            RetryError::Transport { source, .. } => source.status(),
        }
    }
}

/// Send a request built by `build` until it succeeds, fails permanently, or
/// the policy runs out of attempts.
///
/// `build` is invoked once per attempt because a `RequestBuilder` is
/// consumed by `send`.
pub async fn send_with_retry<F>(
    policy: &RetryPolicy,
    path: &str,
    build: F,
) -> Result<Response, RetryError>
where
    F: Fn() -> RequestBuilder,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let error = match build().send().await {
            Ok(response) if response.status().is_success() => {
                if attempt > 1 {
                    info!(path = path, attempt = attempt, "HTTP call succeeded after retry");
                }
                return Ok(response);
            }
            Ok(response) => {
                let status = response.status();
                if !policy.is_retryable(status) {
                    warn!(
                        path = path,
                        status = status.as_u16(),
                        "HTTP call failed with non-retryable status"
                    );
                    return Err(RetryError::Status {
                        status,
                        path: path.to_string(),
                    });
                }
                RetryError::Status {
                    status,
                    path: path.to_string(),
                }
            }
            Err(source) => RetryError::Transport {
                path: path.to_string(),
                source,
            },
        };

        if attempt >= max_attempts {
            warn!(
                path = path,
                attempts = attempt,
                error = %error,
                "HTTP call failed after max attempts"
            );
            return Err(error);
        }

        let backoff = policy.backoff_duration(attempt);
        warn!(
            path = path,
            attempt = attempt,
            error = %error,
            backoff_ms = backoff.as_millis() as u64,
            "HTTP call failed, retrying after backoff"
        );

        sleep(backoff).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            initial_backoff: Duration::ZERO,
            ..RetryPolicy::with_max_attempts(max_attempts)
        }
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_backoff, Duration::from_millis(100));
    }

    #[test]
    fn test_backoff_duration() {
        let policy = RetryPolicy {
            add_jitter: false,
            ..Default::default()
        };

        assert_eq!(policy.backoff_duration(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_duration(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_duration(3), Duration::from_millis(400));
        assert_eq!(policy.backoff_duration(30), Duration::from_secs(10));
    }

    #[test]
    fn test_backoff_jitter_stays_within_a_quarter() {
        let policy = RetryPolicy::default();
        assert!(policy.add_jitter);

        for _ in 0..100 {
            let backoff = policy.backoff_duration(2);
            assert!(backoff >= Duration::from_millis(200));
            assert!(backoff <= Duration::from_millis(250));
        }
        assert_eq!(
            RetryPolicy {
                initial_backoff: Duration::ZERO,
                ..Default::default()
            }
            .backoff_duration(3),
            Duration::ZERO
        );
    }

    #[test]
    fn test_is_retryable() {
        let policy = RetryPolicy::default();

        for status in [413, 429, 500, 502, 503, 504] {
            assert!(policy.is_retryable(StatusCode::from_u16(status).unwrap()));
        }
        assert!(!policy.is_retryable(StatusCode::NOT_FOUND));
        assert!(!policy.is_retryable(StatusCode::FORBIDDEN));
        assert!(!policy.is_retryable(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn test_retries_transient_status_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/record"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/record"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let uri = format!("{}/record", server.uri());
        let response = send_with_retry(&fast_policy(3), "/record", || client.get(&uri))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .expect(4)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let uri = format!("{}/record", server.uri());
        let error = send_with_retry(&fast_policy(4), "/record", || client.get(&uri))
            .await
            .unwrap_err();

        assert_eq!(error.status(), Some(StatusCode::BAD_GATEWAY));
    }

    #[tokio::test]
    async fn test_permanent_status_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let uri = format!("{}/record", server.uri());
        let error = send_with_retry(&fast_policy(5), "/record", || client.get(&uri))
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            RetryError::Status { status: StatusCode::NOT_FOUND, .. }
        ));
    }
}
