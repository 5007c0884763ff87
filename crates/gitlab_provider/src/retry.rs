//! Retry utilities.
//!
//! Only two things retry in this crate: transient network failures (through
//! [`RetryTransport`], an opt-in transport layer) and the merge-request
//! mergeability poll (through [`MergePollConfig`]). Everything else fails fast.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backon::{ConstantBuilder, ExponentialBuilder, Retryable};

use crate::http::{HttpError, HttpRequest, HttpResponse, HttpTransport, TransportLayer};

/// Initial delay between transient-error retries.
pub const INITIAL_BACKOFF_MS: u64 = 1_000;
/// Upper bound for a single transient-error backoff.
pub const MAX_BACKOFF_MS: u64 = 60_000;
/// Maximum number of transient-error retries.
pub const MAX_RETRIES: usize = 5;

/// Maximum mergeability checks before a merge gives up.
pub const MERGE_POLL_ATTEMPTS: usize = 10;
/// Delay between mergeability checks.
pub const MERGE_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Configuration for retry operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Minimum delay between retries.
    pub min_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Maximum number of retry attempts.
    pub max_retries: usize,
    /// Whether to add jitter to delays.
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_delay: Duration::from_millis(MAX_BACKOFF_MS),
            max_retries: MAX_RETRIES,
            with_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom values.
    #[must_use]
    pub fn new(min_delay: Duration, max_delay: Duration, max_retries: usize) -> Self {
        Self {
            min_delay,
            max_delay,
            max_retries,
            with_jitter: true,
        }
    }

    /// Set whether to use jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    /// Build an exponential backoff strategy from this configuration.
    #[must_use]
    pub fn into_backoff(self) -> ExponentialBuilder {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries);

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }

    /// A transport layer that retries transient failures with this configuration.
    #[must_use]
    pub fn into_layer(self) -> TransportLayer {
        Arc::new(
            move |inner: Arc<dyn HttpTransport>| -> Arc<dyn HttpTransport> {
                Arc::new(RetryTransport::new(inner, self.clone()))
            },
        )
    }
}

/// Fixed-interval schedule for the merge-request mergeability poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePollConfig {
    /// Total number of status checks, including the first one.
    pub attempts: usize,
    /// Delay between checks.
    pub interval: Duration,
}

impl Default for MergePollConfig {
    fn default() -> Self {
        Self {
            attempts: MERGE_POLL_ATTEMPTS,
            interval: MERGE_POLL_INTERVAL,
        }
    }
}

impl MergePollConfig {
    #[must_use]
    pub fn into_backoff(self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.interval)
            .with_max_times(self.attempts.saturating_sub(1))
    }
}

/// Responses worth retrying: throttling and gateway failures.
fn is_transient_status(status: u16) -> bool {
    matches!(status, 429 | 502 | 503 | 504)
}

#[derive(Debug)]
enum Attempt {
    Transport(HttpError),
    Status(HttpResponse),
}

impl std::fmt::Display for Attempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Attempt::Transport(e) => write!(f, "{e}"),
            Attempt::Status(resp) => write!(f, "status {}", resp.status),
        }
    }
}

/// Transport decorator that retries transient failures with exponential backoff.
///
/// A 429 is retried for every method, since GitLab rejected the request
/// before acting on it. Transport errors (other than
/// [`HttpError::NoMockResponse`]) and 502/503/504 are retried only for
/// idempotent methods; a POST or PUT whose outcome is unknown is not sent
/// again. When retries run out the last response (or error) is passed
/// through unchanged for normal error classification.
pub struct RetryTransport {
    inner: Arc<dyn HttpTransport>,
    config: RetryConfig,
}

impl RetryTransport {
    pub fn new(inner: Arc<dyn HttpTransport>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl HttpTransport for RetryTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let attempt = AtomicU32::new(0);
        let idempotent = request.method.is_idempotent();

        let op = || async {
            attempt.fetch_add(1, Ordering::SeqCst);
            match self.inner.send(request.clone()).await {
                Ok(resp) if is_transient_status(resp.status) => Err(Attempt::Status(resp)),
                Ok(resp) => Ok(resp),
                Err(e) => Err(Attempt::Transport(e)),
            }
        };

        let result = op
            .retry(self.config.clone().into_backoff())
            .when(|a| match a {
                Attempt::Transport(HttpError::NoMockResponse { .. }) => false,
                Attempt::Transport(_) => idempotent,
                Attempt::Status(resp) => idempotent || resp.status == 429,
            })
            .notify(|a, dur| {
                tracing::debug!(
                    method = %request.method,
                    url = %request.url,
                    attempt = attempt.load(Ordering::SeqCst),
                    "Transient failure ({}), retrying in {:?}",
                    a,
                    dur
                );
            })
            .await;

        match result {
            Ok(resp) => Ok(resp),
            Err(Attempt::Status(resp)) => Ok(resp),
            Err(Attempt::Transport(e)) => Err(e),
        }
    }
}
