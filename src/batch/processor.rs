//! Chunked batch execution

use std::future::Future;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::TaskError;
use crate::progress::{ProgressBus, ProgressEvent, ProgressStatus};
use crate::retry::RetryPolicy;

use super::config::{BatchConfig, BatchConfigError};
use super::report::{BatchPerformance, BatchReport, ChunkError};

/// The BatchProcessor splits a list of items into fixed-size chunks and
/// runs them sequentially through a caller-supplied async function.
///
/// A failed chunk is retried wholesale with linear backoff under a
/// [`RetryPolicy`]; a chunk that exhausts its retries is recorded and,
/// with `continue_on_error` set, skipped. Results from successful chunks
/// are concatenated in input order regardless of failures elsewhere.
pub struct BatchProcessor {
    config: BatchConfig,
    policy: RetryPolicy,
    bus: ProgressBus,
}

impl BatchProcessor {
    /// Create a processor with the default retry policy
    pub fn new(config: BatchConfig) -> Self {
        Self::with_policy(config, RetryPolicy::default())
    }

    /// Create a processor with a custom retry policy
    pub fn with_policy(config: BatchConfig, policy: RetryPolicy) -> Self {
        debug!(?config, "BatchProcessor::with_policy: called");
        // A zero capacity would panic the broadcast channel; validate()
        // reports the bad value to the caller at process time.
        let bus = ProgressBus::new(config.channel_capacity.max(1));
        Self { config, policy, bus }
    }

    /// Subscribe to chunk lifecycle events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ProgressEvent> {
        self.bus.subscribe()
    }

    /// The configuration this processor runs with
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Run `chunk_fn` over `items`, one chunk at a time
    ///
    /// `chunk_fn` receives each chunk as an owned `Vec` and is invoked
    /// once per attempt. Empty `items` reports success without invoking
    /// `chunk_fn` at all. An invalid configuration is rejected before any
    /// work starts.
    pub async fn process<T, R, F, Fut>(
        &self,
        items: Vec<T>,
        mut chunk_fn: F,
    ) -> Result<BatchReport<R>, BatchConfigError>
    where
        T: Clone,
        F: FnMut(Vec<T>) -> Fut,
        Fut: Future<Output = eyre::Result<Vec<R>>>,
    {
        self.config.validate()?;

        let started_at = Utc::now();
        let clock = Instant::now();
        let total_items = items.len();
        let total_batches = total_items.div_ceil(self.config.batch_size);
        debug!(
            total_items,
            total_batches,
            batch_size = self.config.batch_size,
            "BatchProcessor::process: called"
        );

        self.bus.emit(
            ProgressEvent::new(ProgressStatus::Started, 0, total_items).with_total_batches(total_batches),
        );

        let mut results = Vec::new();
        let mut errors: Vec<ChunkError> = Vec::new();
        let mut chunk_times_ms: Vec<u64> = Vec::new();
        let mut processed_items = 0;
        let mut retry_count: u32 = 0;
        let mut aborted = false;

        for (chunk_index, chunk) in items.chunks(self.config.batch_size).enumerate() {
            debug!(chunk_index, len = chunk.len(), "BatchProcessor::process: starting chunk");
            self.bus.emit(
                ProgressEvent::new(ProgressStatus::Processing, processed_items, total_items)
                    .with_batch(chunk_index + 1, total_batches),
            );

            let mut attempt: u32 = 0;
            loop {
                let chunk_clock = Instant::now();
                let outcome = chunk_fn(chunk.to_vec()).await;
                chunk_times_ms.push(chunk_clock.elapsed().as_millis() as u64);

                match outcome {
                    Ok(mut chunk_results) => {
                        processed_items += chunk.len();
                        results.append(&mut chunk_results);
                        break;
                    }
                    Err(report) => {
                        let error = TaskError::from(report);
                        if self.policy.should_retry(&error, attempt, self.config.max_retries) {
                            attempt += 1;
                            retry_count += 1;
                            debug!(chunk_index, attempt, "BatchProcessor::process: retrying chunk");
                            self.bus.emit(
                                ProgressEvent::new(ProgressStatus::Retrying, processed_items, total_items)
                                    .with_batch(chunk_index + 1, total_batches)
                                    .with_error(error.to_string()),
                            );
                            tokio::time::sleep(self.policy.delay_for(attempt, self.config.retry_delay())).await;
                        } else {
                            warn!(
                                chunk_index,
                                attempts = attempt + 1,
                                error = %error,
                                "BatchProcessor::process: chunk failed"
                            );
                            self.bus.emit(
                                ProgressEvent::new(ProgressStatus::Failed, processed_items, total_items)
                                    .with_batch(chunk_index + 1, total_batches)
                                    .with_error(error.to_string()),
                            );
                            errors.push(ChunkError {
                                chunk_index,
                                message: error.to_string(),
                                attempts: attempt + 1,
                            });
                            if !self.config.continue_on_error {
                                aborted = true;
                            }
                            break;
                        }
                    }
                }
            }

            if aborted {
                debug!(chunk_index, "BatchProcessor::process: aborting remaining chunks");
                break;
            }
        }

        let duration_ms = clock.elapsed().as_millis() as u64;
        let attempts = chunk_times_ms.len();
        let average_batch_ms = if attempts > 0 {
            duration_ms as f64 / attempts as f64
        } else {
            0.0
        };

        let failed_every_chunk = total_batches > 0 && errors.len() == total_batches;
        let terminal = if aborted || failed_every_chunk {
            ProgressStatus::Failed
        } else {
            ProgressStatus::Completed
        };
        self.bus.emit(ProgressEvent::new(terminal, processed_items, total_items));

        debug!(
            processed_items,
            errors = errors.len(),
            retry_count,
            duration_ms,
            "BatchProcessor::process: finished"
        );

        Ok(BatchReport {
            success: errors.is_empty(),
            processed_items,
            total_items,
            results,
            errors,
            performance: BatchPerformance {
                started_at,
                ended_at: Utc::now(),
                duration_ms,
                chunk_times_ms,
                average_batch_ms,
                retry_count,
            },
        })
    }
}
