//! Bounded retry helper

use std::future::Future;
use std::time::Duration;

/// Fixed-interval retry policy with a hard attempt limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Sleep before each attempt
    pub interval: Duration,
    /// Maximum number of attempts
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Worst-case time spent sleeping
    pub fn max_wait(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

/// Result of a bounded poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    /// Attempts actually made
    pub attempts: u32,
    /// Whether the predicate returned true
    pub succeeded: bool,
}

/// Run `predicate` until it returns true or the policy is exhausted
///
/// Sleeps one interval before every attempt. The predicate receives the
/// 1-based attempt number.
pub async fn poll_until<F, Fut>(policy: RetryPolicy, mut predicate: F) -> PollOutcome
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = bool>,
{
    for attempt in 1..=policy.max_attempts {
        tokio::time::sleep(policy.interval).await;
        if predicate(attempt).await {
            return PollOutcome {
                attempts: attempt,
                succeeded: true,
            };
        }
    }

    PollOutcome {
        attempts: policy.max_attempts,
        succeeded: false,
    }
}
