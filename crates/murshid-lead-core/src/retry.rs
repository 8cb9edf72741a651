//! Retry policy for outbound Lead Store calls
//!
//! An explicit state machine instead of a retry-via-catch loop: each
//! failed attempt is classified, the policy decides the next state, and
//! the backoff delay is a pure function of the attempt number. The
//! boundary is strict: only failures to *reach* the server are retried.
//! Any HTTP response, including 4xx/5xx, means the request arrived and
//! retrying could create a duplicate lead.

use std::time::Duration;

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The server was never reached (connect refused, reset, premature
    /// close). Safe to retry.
    Transient,
    /// The per-attempt timeout fired. Surfaced distinctly, not retried.
    Timeout,
    /// The server was reached (any HTTP status, or a body/decode error
    /// after a response). Never retried.
    Permanent,
}

/// Classify a `reqwest` transport error.
///
/// Deliberately predicate-based rather than matching on error message
/// substrings.
pub fn classify(err: &reqwest::Error) -> FailureClass {
    if err.is_timeout() {
        FailureClass::Timeout
    } else if err.status().is_some() || err.is_decode() || err.is_builder() {
        FailureClass::Permanent
    } else {
        FailureClass::Transient
    }
}

/// Retry state for one logical operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// About to run attempt `n` (1-based).
    Attempting(u32),
    /// The operation completed.
    Succeeded,
    /// Transient failures exhausted the attempt budget.
    FailedTransient,
    /// A non-retryable failure (timeout or reached-server error).
    FailedPermanent,
}

/// Attempt budget and backoff schedule.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay before retrying after attempt `n` (1-based): base doubled
    /// each attempt. Pure.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Advance the state machine after a failed attempt `n`.
    pub fn after_failure(&self, attempt: u32, class: FailureClass) -> RetryState {
        match class {
            FailureClass::Timeout | FailureClass::Permanent => RetryState::FailedPermanent,
            FailureClass::Transient if attempt < self.max_attempts => {
                RetryState::Attempting(attempt + 1)
            }
            FailureClass::Transient => RetryState::FailedTransient,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_base() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(1));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(3), Duration::from_secs(4));
    }

    #[test]
    fn transient_failures_retry_until_budget_exhausted() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.after_failure(1, FailureClass::Transient),
            RetryState::Attempting(2)
        );
        assert_eq!(
            policy.after_failure(2, FailureClass::Transient),
            RetryState::Attempting(3)
        );
        assert_eq!(
            policy.after_failure(3, FailureClass::Transient),
            RetryState::FailedTransient
        );
    }

    #[test]
    fn timeout_and_reached_server_never_retry() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.after_failure(1, FailureClass::Timeout),
            RetryState::FailedPermanent
        );
        assert_eq!(
            policy.after_failure(1, FailureClass::Permanent),
            RetryState::FailedPermanent
        );
    }
}
