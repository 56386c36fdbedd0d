//! Status notification
//!
//! Outcomes go to two places: the single registered device-policy listener
//! (see [`listener`]) and an in-process broadcast bus for local observers.

pub mod listener;
pub mod types;

pub use listener::{GadgetCallback, PortCallback, PortCallbackExt, PortListener, StatusNotifier};
pub use types::UsbEvent;

use tokio::sync::broadcast;

/// Event channel capacity (ring buffer size)
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Event bus for broadcasting USB events
///
/// Events are delivered to all active subscribers.
pub struct EventBus {
    tx: broadcast::Sender<UsbEvent>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an event to all subscribers
    ///
    /// If there are no active subscribers, the event is dropped.
    pub fn publish(&self, event: UsbEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to events
    ///
    /// A subscriber that falls too far behind receives `Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<UsbEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
