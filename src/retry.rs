//! Retry logic with exponential backoff and per-attempt time budgets
//!
//! Every call into an external collaborator goes through [`bounded_call`]:
//! each attempt is wrapped in a timeout, and transient failures (including
//! timeouts) are retried with exponential backoff and optional jitter.
//!
//! # Example
//!
//! ```no_run
//! use edition_courier::retry::{IsRetryable, call_with_retry};
//! use edition_courier::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! call_with_retry(&config, || async { Ok::<_, MyError>(()) }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{DiscoveryError, Error};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network timeouts, source busy, connection reset) return `true`.
/// Permanent failures (authentication failed, rejected recipient, bad data) return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Timeout { .. } => true,
            Error::Discovery(DiscoveryError::Unavailable { .. }) => true,
            Error::Discovery(DiscoveryError::Authentication { .. }) => false,
            Error::Channel { transient, .. } => *transient,
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            Error::Download(msg) => {
                msg.contains("timeout")
                    || msg.contains("temporar")
                    || msg.contains("503")
                    || msg.contains("429")
            }
            // Store errors are surfaced immediately; the tracking guarantee
            // must not silently wait on a broken database
            Error::Database(_) => false,
            Error::Config { .. } => false,
            Error::InvalidDocument(_) => false,
            Error::Serialization(_) => false,
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// Returns the successful result or the last error after all retry attempts are
/// exhausted. Non-retryable errors are returned immediately.
pub async fn call_with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                let jittered_delay = if config.jitter {
                    add_jitter(delay)
                } else {
                    delay
                };

                tokio::time::sleep(jittered_delay).await;

                let next_delay =
                    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
                delay = next_delay.min(config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::debug!(error = %e, "Operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Bound a single attempt by `budget`, mapping an elapsed budget to [`Error::Timeout`]
pub async fn call_with_timeout<T, Fut>(operation: &str, budget: Duration, fut: Fut) -> crate::Result<T>
where
    Fut: Future<Output = crate::Result<T>>,
{
    match tokio::time::timeout(budget, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            operation: operation.to_string(),
            after: budget,
        }),
    }
}

/// Call a collaborator with a time budget per attempt and bounded retries
///
/// This is the single boundary every external call passes through, so a hung
/// dependency costs at most `(max_attempts + 1) * budget` plus backoff.
pub async fn bounded_call<F, Fut, T>(
    operation: &str,
    budget: Duration,
    retry: &RetryConfig,
    mut call: F,
) -> crate::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = crate::Result<T>>,
{
    call_with_retry(retry, || call_with_timeout(operation, budget, call())).await
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The actual delay will be between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
