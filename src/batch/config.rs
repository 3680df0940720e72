//! Batch processor configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Rejected configuration, carrying every problem found
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid batch configuration: {}", .0.join("; "))]
pub struct BatchConfigError(pub Vec<String>);

/// Batch processor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Items per chunk
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Retries per chunk after its first failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff between chunk retries in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Keep going past a chunk that exhausts its retries
    #[serde(default = "default_continue_on_error")]
    pub continue_on_error: bool,

    /// Capacity of the progress broadcast channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_batch_size() -> usize {
    100
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

fn default_continue_on_error() -> bool {
    true
}

fn default_channel_capacity() -> usize {
    1024
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_retries: 3,
            retry_delay_ms: 1_000,
            continue_on_error: true,
            channel_capacity: 1024,
        }
    }
}

impl BatchConfig {
    /// Check the configuration, collecting every problem rather than
    /// stopping at the first
    pub fn validate(&self) -> Result<(), BatchConfigError> {
        let mut problems = Vec::new();
        if self.batch_size == 0 {
            problems.push("batch_size must be greater than 0".to_string());
        }
        if self.channel_capacity == 0 {
            problems.push("channel_capacity must be greater than 0".to_string());
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(BatchConfigError(problems))
        }
    }

    /// Get the base retry delay as a Duration
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
