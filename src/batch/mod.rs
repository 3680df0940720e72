//! Chunked batch processing
//!
//! Splits item lists into fixed-size chunks, runs each chunk through a
//! caller-supplied async function with wholesale retry, and reports
//! per-chunk outcomes and timing.

mod config;
mod processor;
mod report;

pub use config::{BatchConfig, BatchConfigError};
pub use processor::BatchProcessor;
pub use report::{BatchPerformance, BatchReport, ChunkError};
