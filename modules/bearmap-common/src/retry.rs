//! Exponential-backoff retry for network calls.
//!
//! The wrapper retries unconditionally; callers that only want to retry
//! transient failures should consult [`is_retryable`] inside their
//! operation and return early for permanent errors.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Backoff configuration. Delay for attempt `n` (0-based) is
/// `min(initial_delay_ms * backoff_multiplier^n, max_delay_ms)`.
#[derive(Debug, Clone)]
pub struct RetryOptions {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryOptions {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let raw = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis((raw as u64).min(self.max_delay_ms))
    }
}

/// Run `op`, retrying with exponential backoff. Returns the first success
/// or the last error after `max_retries` retries (`max_retries + 1` total
/// attempts).
pub async fn with_retry<T, E, F, Fut>(op: F, opts: &RetryOptions) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    with_retry_and_hook(op, opts, |_, _| {}).await
}

/// Like [`with_retry`], invoking `on_retry(error, attempt_number)` before
/// each retry sleep. `attempt_number` is 1-based and counts retries, not
/// initial attempts.
pub async fn with_retry_and_hook<T, E, F, Fut, H>(
    mut op: F,
    opts: &RetryOptions,
    mut on_retry: H,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    H: FnMut(&E, u32),
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < opts.max_retries => {
                let delay = opts.delay_for_attempt(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_retries = opts.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retrying after failure"
                );
                on_retry(&err, attempt + 1);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                warn!(retries = opts.max_retries, error = %err, "All retry attempts failed");
                return Err(err);
            }
        }
    }
}

/// Whether an HTTP error looks transient: connect/timeout failures, or a
/// retryable status from [`is_retryable_status`].
pub fn is_retryable(err: &reqwest::Error) -> bool {
    if err.is_connect() || err.is_timeout() {
        return true;
    }
    err.status().map(is_retryable_status).unwrap_or(false)
}

/// 429, 503, 504 and any 5xx are worth retrying.
pub fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 503 | 504) || status.is_server_error()
}

/// GET a URL with retry, treating non-2xx responses as failures.
pub async fn fetch_with_retry(
    client: &reqwest::Client,
    url: &str,
    opts: &RetryOptions,
) -> Result<reqwest::Response, reqwest::Error> {
    with_retry(
        || async { client.get(url).send().await?.error_for_status() },
        opts,
    )
    .await
}
