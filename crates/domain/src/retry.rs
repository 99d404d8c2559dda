//! Retry policy for vendor calls.

use std::time::Duration;

use crate::error::ProviderError;

/// Exponential backoff over transient provider failures.
///
/// `max_attempts` counts the first call, so `1` means no retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: u32,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// A single attempt.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            multiplier: 1,
            max_backoff: Duration::ZERO,
        }
    }

    /// Doubling backoff between `initial_backoff` and `max_backoff`.
    #[must_use]
    pub fn exponential(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            multiplier: 2,
            max_backoff,
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` is 1-based.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self
            .multiplier
            .checked_pow(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Whether a failure on `attempt` (1-based) should be retried.
    #[must_use]
    pub fn should_retry(&self, attempt: u32, err: &ProviderError) -> bool {
        attempt < self.max_attempts && err.is_transient()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Provider;

    fn server_error() -> ProviderError {
        ProviderError::Api {
            provider: Provider::Square,
            status: 503,
            message: "unavailable".to_string(),
        }
    }

    #[test]
    fn should_not_retry_by_default() {
        assert!(!RetryPolicy::default().should_retry(1, &server_error()));
    }

    #[test]
    fn should_retry_transient_errors_until_max_attempts() {
        let policy = RetryPolicy::exponential(3, Duration::from_millis(10), Duration::from_secs(1));
        assert!(policy.should_retry(1, &server_error()));
        assert!(policy.should_retry(2, &server_error()));
        assert!(!policy.should_retry(3, &server_error()));
    }

    #[test]
    fn should_not_retry_when_error_is_permanent() {
        let policy = RetryPolicy::exponential(5, Duration::from_millis(10), Duration::from_secs(1));
        assert!(!policy.should_retry(1, &ProviderError::TokenExpired));
        let bad_request = ProviderError::Api {
            provider: Provider::Clover,
            status: 400,
            message: "bad".to_string(),
        };
        assert!(!policy.should_retry(1, &bad_request));
    }

    #[test]
    fn should_double_delay_up_to_max_backoff() {
        let policy =
            RetryPolicy::exponential(10, Duration::from_millis(100), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(40), Duration::from_millis(500));
    }
}
