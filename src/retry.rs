//! Retry classification and backoff

use std::time::Duration;

use tracing::debug;

use crate::error::TaskError;

/// Decides whether a failed attempt is retried, and after what delay
///
/// Classification is by error category first (cancellation, cleanup, and
/// duplicate rejection are never retried; timeouts always are), then by a
/// configured set of message substrings for execution failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Lowercased substrings marking an execution failure as non-retryable
    non_retryable: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(vec![
            "authentication".to_string(),
            "unauthorized".to_string(),
            "invalid api key".to_string(),
            "forbidden".to_string(),
        ])
    }
}

impl RetryPolicy {
    /// Create a policy with the given non-retryable message substrings
    pub fn new(non_retryable: Vec<String>) -> Self {
        Self {
            non_retryable: non_retryable.into_iter().map(|s| s.to_lowercase()).collect(),
        }
    }

    /// Check whether an error is worth retrying at all
    pub fn is_retryable(&self, error: &TaskError) -> bool {
        match error {
            TaskError::Cancelled | TaskError::Cleanup | TaskError::Duplicate(_) => false,
            TaskError::Timeout(_) => true,
            TaskError::Execution(report) => {
                let message = report.to_string().to_lowercase();
                !self.non_retryable.iter().any(|needle| message.contains(needle))
            }
        }
    }

    /// Decide whether a failed attempt should be re-queued
    ///
    /// `attempt` is the number of retries already consumed.
    pub fn should_retry(&self, error: &TaskError, attempt: u32, max_retries: u32) -> bool {
        if attempt >= max_retries {
            debug!(attempt, max_retries, "RetryPolicy::should_retry: retries exhausted");
            return false;
        }
        let retryable = self.is_retryable(error);
        if !retryable {
            debug!(%error, "RetryPolicy::should_retry: error is non-retryable");
        }
        retryable
    }

    /// Backoff before the given attempt: linear in the attempt number
    ///
    /// `attempt` is 1-indexed at the point the retry is scheduled.
    pub fn delay_for(&self, attempt: u32, base: Duration) -> Duration {
        base * attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::eyre;

    #[test]
    fn test_exhausted_attempts_stop_retrying() {
        let policy = RetryPolicy::default();
        let err = TaskError::Execution(eyre!("connection reset"));

        assert!(policy.should_retry(&err, 0, 3));
        assert!(policy.should_retry(&err, 2, 3));
        assert!(!policy.should_retry(&err, 3, 3));
        assert!(!policy.should_retry(&err, 5, 3));
    }

    #[test]
    fn test_timeout_is_retryable() {
        let policy = RetryPolicy::default();
        assert!(policy.is_retryable(&TaskError::Timeout(Duration::from_secs(30))));
    }

    #[test]
    fn test_control_errors_are_not_retryable() {
        let policy = RetryPolicy::default();
        assert!(!policy.is_retryable(&TaskError::Cancelled));
        assert!(!policy.is_retryable(&TaskError::Cleanup));
        assert!(!policy.is_retryable(&TaskError::Duplicate("job-1".to_string())));
    }

    #[test]
    fn test_non_retryable_message_substrings() {
        let policy = RetryPolicy::default();

        let auth = TaskError::Execution(eyre!("Authentication failed for key"));
        assert!(!policy.is_retryable(&auth));
        assert!(!policy.should_retry(&auth, 0, 3));

        let transient = TaskError::Execution(eyre!("upstream returned 503"));
        assert!(policy.is_retryable(&transient));
    }

    #[test]
    fn test_custom_substring_set() {
        let policy = RetryPolicy::new(vec!["Quota Exceeded".to_string()]);

        let quota = TaskError::Execution(eyre!("quota exceeded for project"));
        assert!(!policy.is_retryable(&quota));

        let auth = TaskError::Execution(eyre!("authentication failed"));
        assert!(policy.is_retryable(&auth));
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();
        let base = Duration::from_millis(1000);

        assert_eq!(policy.delay_for(1, base), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2, base), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(3, base), Duration::from_millis(3000));
    }
}
