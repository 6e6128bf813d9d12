//! Deadline-bounded retry for calls that can fail transiently.
//!
//! The API occasionally answers link creation with a 5xx while it is still
//! settling a freshly created entity. [`retry_until`] repeats such calls with
//! exponential backoff until they succeed, fail for a non-transient reason,
//! or the deadline passes.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Default deadline for retried operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default first backoff interval.
pub const DEFAULT_MIN_BACKOFF: Duration = Duration::from_millis(500);

/// Default cap on the backoff interval.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Classifies errors as worth retrying or not.
pub trait Retryable {
    /// Whether a later attempt is likely to succeed.
    fn is_transient(&self) -> bool;
}

/// How long and how often to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wall-clock budget measured from the first attempt.
    pub timeout: Duration,
    /// Delay after the first transient failure.
    pub min_backoff: Duration,
    /// Upper bound for the doubling delay.
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// A policy with the given deadline and default backoff.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Override the backoff bounds.
    pub fn with_backoff(mut self, min: Duration, max: Duration) -> Self {
        self.min_backoff = min;
        self.max_backoff = max.max(min);
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            min_backoff: DEFAULT_MIN_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

/// Run `op` until it succeeds, fails terminally, or the deadline passes.
///
/// - `Ok` is returned as soon as an attempt succeeds.
/// - A non-transient error is returned immediately, after a single attempt.
/// - Transient errors are retried with exponential backoff. Sleeps are cut
///   short at the deadline, and once it has passed the last transient error
///   is returned as-is.
/// - A timeout too large to represent as an instant means no deadline.
pub async fn retry_until<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let deadline = Instant::now().checked_add(policy.timeout);
    let mut backoff = policy.min_backoff;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) => err,
        };

        let now = Instant::now();
        let wait = match deadline {
            Some(deadline) if now >= deadline => {
                warn!(
                    attempt,
                    timeout_secs = policy.timeout.as_secs_f64(),
                    error = %err,
                    "Retry deadline exceeded"
                );
                return Err(err);
            },
            Some(deadline) => backoff.min(deadline - now),
            None => backoff,
        };
        debug!(
            attempt,
            delay_ms = wait.as_millis() as u64,
            error = %err,
            "Transient failure, retrying"
        );
        sleep(wait).await;
        backoff = backoff.saturating_mul(2).min(policy.max_backoff);
    }
}
