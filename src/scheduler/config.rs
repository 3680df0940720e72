//! Scheduler configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::task::Priority;

/// Scheduler configuration
///
/// Per-task [`TaskOptions`](crate::task::TaskOptions) override the
/// `timeout_ms`, `retry_count`, `retry_delay_ms`, and `default_priority`
/// fields for a single submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Max tasks executing at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Per-attempt timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Retries after the first attempt fails
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Base backoff in milliseconds; the n-th retry waits n times this
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Priority for tasks that do not specify one
    #[serde(default)]
    pub default_priority: Priority,

    /// Capacity of the progress broadcast channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_max_concurrency() -> usize {
    2
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

fn default_channel_capacity() -> usize {
    1024
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 2,
            timeout_ms: 30_000,
            retry_count: 3,
            retry_delay_ms: 1_000,
            default_priority: Priority::Normal,
            channel_capacity: 1024,
        }
    }
}

impl SchedulerConfig {
    /// Coerce out-of-range values back to their defaults
    ///
    /// Zero concurrency would deadlock every submission and a zero-capacity
    /// broadcast channel is rejected by tokio, so both are replaced rather
    /// than honored.
    pub fn sanitize(mut self) -> Self {
        if self.max_concurrency == 0 {
            warn!(
                max_concurrency = self.max_concurrency,
                "SchedulerConfig::sanitize: invalid max_concurrency, using default"
            );
            self.max_concurrency = default_max_concurrency();
        }
        if self.timeout_ms == 0 {
            warn!(
                timeout_ms = self.timeout_ms,
                "SchedulerConfig::sanitize: invalid timeout_ms, using default"
            );
            self.timeout_ms = default_timeout_ms();
        }
        if self.channel_capacity == 0 {
            warn!(
                channel_capacity = self.channel_capacity,
                "SchedulerConfig::sanitize: invalid channel_capacity, using default"
            );
            self.channel_capacity = default_channel_capacity();
        }
        self
    }

    /// Get the per-attempt timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get the base retry delay as a Duration
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
