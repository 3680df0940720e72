//! Progress event types
//!
//! Events are point-in-time snapshots of work progress, emitted by the
//! scheduler (task lifecycle) and the batch processor (chunk lifecycle).
//! They are plain data: receivers get counters and optional context, never
//! references into scheduler internals.

use serde::{Deserialize, Serialize};

/// Lifecycle stage a progress event reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Started,
    Processing,
    Retrying,
    Completed,
    Failed,
}

impl std::fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::Processing => write!(f, "processing"),
            Self::Retrying => write!(f, "retrying"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A snapshot of work progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Units finished so far
    pub processed: usize,

    /// Total units known to the emitter
    pub total: usize,

    /// `processed` over `total`, scaled to 0..=100
    pub percentage: f64,

    pub status: ProgressStatus,

    /// One-based chunk number, for batch events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_batch: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_batches: Option<usize>,

    /// Free-form context, e.g. the task id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressEvent {
    pub fn new(status: ProgressStatus, processed: usize, total: usize) -> Self {
        Self {
            processed,
            total,
            percentage: percentage(processed, total),
            status,
            current_batch: None,
            total_batches: None,
            message: None,
            error: None,
        }
    }

    pub fn with_batch(mut self, current: usize, total: usize) -> Self {
        self.current_batch = Some(current);
        self.total_batches = Some(total);
        self
    }

    pub fn with_total_batches(mut self, total: usize) -> Self {
        self.total_batches = Some(total);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Completion fraction as 0..=100; an empty total counts as fully complete
fn percentage(processed: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        (processed as f64 / total as f64) * 100.0
    }
}
