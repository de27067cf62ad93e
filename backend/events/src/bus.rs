//! Event Bus
//!
//! Process-wide broadcast channel carrying encoded events to every connected
//! subscriber. Messages travel as JSON text so that a networked pub/sub
//! backend can stand in without changing subscribers.

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::event::Event;

/// Default number of buffered messages before slow receivers start lagging.
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<String>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { sender: tx }
    }

    /// Publish an event to every current subscriber.
    pub fn publish(&self, event: &Event) {
        match event.encode() {
            Ok(message) => self.publish_raw(message),
            Err(e) => warn!(event = %event.id, error = %e, "Failed to encode event"),
        }
    }

    /// Publish a pre-encoded message.
    pub fn publish_raw(&self, message: String) {
        if self.sender.send(message).is_err() {
            debug!("Event published with no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
