//! Task error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can terminate a submitted task
///
/// Terminal failures carry the real underlying cause: a task that exhausts
/// its retries is rejected with the last attempt's error, never a wrapper.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cancelled")]
    Cancelled,

    #[error("Cleaned up")]
    Cleanup,

    #[error("Duplicate task id: {0}")]
    Duplicate(String),

    #[error("{0}")]
    Execution(eyre::Report),
}

impl TaskError {
    /// Check if this task failed its timeout race
    pub fn is_timeout(&self) -> bool {
        matches!(self, TaskError::Timeout(_))
    }

    /// Check if this task was explicitly cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled)
    }

    /// Check if this task was rejected by a scheduler-wide cleanup
    pub fn is_cleanup(&self) -> bool {
        matches!(self, TaskError::Cleanup)
    }

    /// Check if this submission was rejected as a duplicate id
    pub fn is_duplicate(&self) -> bool {
        matches!(self, TaskError::Duplicate(_))
    }
}

impl From<eyre::Report> for TaskError {
    fn from(report: eyre::Report) -> Self {
        TaskError::Execution(report)
    }
}
