//! TaskGate - Bounded-Concurrency Task Scheduling
//!
//! TaskGate runs caller-supplied async tasks under a concurrency cap, with
//! priority queuing, per-attempt timeouts, retry with linear backoff, and
//! a chunked batch processor for large item lists. Progress is broadcast
//! as events rather than reported through callbacks.
//!
//! # Core Concepts
//!
//! - **Bounded Admission**: At most `max_concurrency` tasks run at once;
//!   the rest wait in a priority queue, FIFO within a band
//! - **Timeout Racing**: Every attempt races a timer; a lost race fails
//!   the attempt while the executor finishes in the background
//! - **Best-Effort Cancellation**: Cancelling settles the caller at once
//!   but never interrupts an executor already in flight
//! - **Observable Progress**: Lifecycle events fan out over a broadcast
//!   channel to any number of subscribers
//!
//! # Modules
//!
//! - [`scheduler`] - Admission control, priority queue, timeout, retry
//! - [`batch`] - Chunked batch execution over large item lists
//! - [`retry`] - Retry policy and backoff
//! - [`progress`] - Lifecycle event types and broadcast bus
//! - [`task`] - Priority levels and per-task options
//! - [`error`] - Task failure categories

pub mod batch;
pub mod error;
pub mod progress;
pub mod retry;
pub mod scheduler;
pub mod task;

// Re-export commonly used types
pub use batch::{BatchConfig, BatchConfigError, BatchPerformance, BatchProcessor, BatchReport, ChunkError};
pub use error::TaskError;
pub use progress::{DEFAULT_CHANNEL_CAPACITY, ProgressBus, ProgressEvent, ProgressStatus};
pub use retry::RetryPolicy;
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerStats};
pub use task::{Priority, TaskOptions};
