use std::time::Duration;
use trading::{ExecutionFailure, FailureKind};

/// Retry-with-backoff policy for transient execution failures.
///
/// [`RetryPolicy::should_retry`] is the only place deciding whether a failure
/// is worth another attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_backoff: Duration,
    max_backoff: Duration,
    retry_rejections: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100))
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_backoff: Duration) -> Self {
        Self {
            max_retries,
            base_backoff,
            max_backoff: Duration::from_secs(10),
            retry_rejections: false,
        }
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Also retries server-side rejections the broker reported as permanent.
    pub fn with_retry_rejections(mut self, retry: bool) -> Self {
        self.retry_rejections = retry;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Total attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn retries_rejections(&self) -> bool {
        self.retry_rejections
    }

    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    pub fn should_retry(&self, failure: &ExecutionFailure) -> bool {
        failure.is_transient() || (self.retry_rejections && failure.kind == FailureKind::Rejected)
    }
}
