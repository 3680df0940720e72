//! Scheduler statistics

use serde::{Deserialize, Serialize};

/// Point-in-time scheduler counters
///
/// `failed_requests` counts every non-success settlement, including
/// cancellations and cleanup. `average_execution_ms` averages only
/// successful tasks, measured from admission to settlement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub active_requests: usize,
    pub queued_requests: usize,
    pub average_execution_ms: f64,
    pub peak_active: usize,
    pub peak_queued: usize,
}

/// Accumulates counters as tasks move through the scheduler
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    total_execution_ms: u64,
    peak_active: usize,
    peak_queued: usize,
}

impl StatsRecorder {
    pub fn record_submitted(&mut self) {
        self.total_requests += 1;
    }

    pub fn record_success(&mut self, execution_ms: u64) {
        self.successful_requests += 1;
        self.total_execution_ms += execution_ms;
    }

    pub fn record_failure(&mut self) {
        self.failed_requests += 1;
    }

    /// Track high-water marks for the active and queued sets
    pub fn observe_depths(&mut self, active: usize, queued: usize) {
        self.peak_active = self.peak_active.max(active);
        self.peak_queued = self.peak_queued.max(queued);
    }

    /// Tasks that have reached a final outcome
    pub fn settled(&self) -> u64 {
        self.successful_requests + self.failed_requests
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests
    }

    pub fn snapshot(&self, active: usize, queued: usize) -> SchedulerStats {
        let average_execution_ms = if self.successful_requests > 0 {
            self.total_execution_ms as f64 / self.successful_requests as f64
        } else {
            0.0
        };
        SchedulerStats {
            total_requests: self.total_requests,
            successful_requests: self.successful_requests,
            failed_requests: self.failed_requests,
            active_requests: active,
            queued_requests: queued,
            average_execution_ms,
            peak_active: self.peak_active,
            peak_queued: self.peak_queued,
        }
    }
}
