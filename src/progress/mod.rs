//! Progress reporting
//!
//! Scheduler and batch lifecycle events, broadcast to any number of
//! subscribers without blocking the emitter.

mod bus;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, ProgressBus};
pub use types::{ProgressEvent, ProgressStatus};
