//! Batch outcome reporting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chunk that exhausted its retries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkError {
    /// Zero-based position of the chunk in the input
    pub chunk_index: usize,

    pub message: String,

    /// Invocations spent on the chunk, the first included
    pub attempts: u32,
}

/// Timing breakdown for one batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPerformance {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,

    /// Wall time from first chunk start to last chunk end
    pub duration_ms: u64,

    /// Wall time of every chunk invocation, retries included
    pub chunk_times_ms: Vec<u64>,

    /// `duration_ms` over the number of chunk invocations
    pub average_batch_ms: f64,

    /// Chunk retries consumed across the whole run
    pub retry_count: u32,
}

/// Outcome of one batch run
///
/// `success` means no chunk exhausted its retries. Results from chunks
/// that did succeed are always kept, in input order, even when the run
/// as a whole failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport<R> {
    pub success: bool,
    pub processed_items: usize,
    pub total_items: usize,
    pub results: Vec<R>,
    pub errors: Vec<ChunkError>,
    pub performance: BatchPerformance,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serializes_round() {
        let report = BatchReport {
            success: false,
            processed_items: 20,
            total_items: 30,
            results: vec![1, 2, 3],
            errors: vec![ChunkError {
                chunk_index: 1,
                message: "upstream 503".to_string(),
                attempts: 3,
            }],
            performance: BatchPerformance {
                started_at: Utc::now(),
                ended_at: Utc::now(),
                duration_ms: 120,
                chunk_times_ms: vec![40, 30, 50],
                average_batch_ms: 40.0,
                retry_count: 2,
            },
        };

        let json = serde_json::to_string(&report).unwrap();
        let parsed: BatchReport<i32> = serde_json::from_str(&json).unwrap();
        assert!(!parsed.success);
        assert_eq!(parsed.results, vec![1, 2, 3]);
        assert_eq!(parsed.errors[0].chunk_index, 1);
        assert_eq!(parsed.performance.retry_count, 2);
    }
}
