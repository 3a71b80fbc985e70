use std::time::Duration;

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retries exhausted; the task becomes terminally failed.
    GiveUp,
    /// Requeue the task after the given delay.
    RetryAfter(Duration),
}

/// Bounded retry policy with a backoff that grows with the retry count.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Consecutive failures after which the task is given up.
    pub max_retries: u32,
    /// Delay unit; the n-th retry waits `base_delay * n`.
    pub base_delay: Duration,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Decide what to do after a failure.
    ///
    /// `retries` is the task's consecutive failure count *including* the
    /// failure just observed (1 = first failure).
    pub fn decide(&self, retries: u32) -> RetryDecision {
        if retries >= self.max_retries {
            return RetryDecision::GiveUp;
        }
        let delay = self.base_delay.saturating_mul(retries.max(1)).min(self.max_delay);
        RetryDecision::RetryAfter(delay)
    }
}
