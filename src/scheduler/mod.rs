//! Bounded-concurrency task scheduling
//!
//! Admission control, priority queuing, timeout racing, and retry with
//! linear backoff live here. Submit work through [`Scheduler::execute`]
//! and observe it through [`Scheduler::subscribe`] and
//! [`Scheduler::stats`].

mod config;
mod core;
mod queue;
mod stats;

pub use config::SchedulerConfig;
pub use core::Scheduler;
pub use stats::SchedulerStats;
