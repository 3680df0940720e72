//! Broadcast bus for progress events
//!
//! Fan-out from emitters to any number of subscribers over a tokio
//! broadcast channel. Emitting never blocks and never fails: with no
//! subscribers the event is dropped, and a subscriber that falls more
//! than the channel capacity behind loses the oldest events.

use tokio::sync::broadcast;
use tracing::debug;

use crate::progress::ProgressEvent;

/// Default capacity for the underlying broadcast channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Cloneable handle for emitting and subscribing to progress events
#[derive(Clone)]
pub struct ProgressBus {
    tx: broadcast::Sender<ProgressEvent>,
}

impl ProgressBus {
    /// Create a bus with the given channel capacity
    ///
    /// Capacity must be positive.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Broadcast an event to all current subscribers
    pub fn emit(&self, event: ProgressEvent) {
        debug!(
            status = %event.status,
            processed = event.processed,
            total = event.total,
            "ProgressBus::emit: broadcasting"
        );
        // A send error only means nobody is listening right now
        let _ = self.tx.send(event);
    }

    /// Open a new subscription; only events emitted after this call are seen
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}
