//! Event bus for broadcasting lease events to subscribers
//!
//! Uses a tokio broadcast channel for pub/sub.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::events::{EventMessage, LeaseEvent};

/// Default channel capacity
const DEFAULT_CAPACITY: usize = 256;

/// Broadcasts lease events to all subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventMessage>,
    subscriber_count: Arc<AtomicUsize>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscriber_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Publish an event to all subscribers. Publishing with no subscribers
    /// is normal (no UI attached) and not an error.
    pub fn publish(&self, event: LeaseEvent) {
        let event_type = event.event_type();
        let reservation_id = event.reservation_id().to_string();

        match self.sender.send(EventMessage::new(event)) {
            Ok(count) => {
                debug!(event_type, %reservation_id, subscribers = count, "event published");
            }
            Err(_) => {
                debug!(event_type, %reservation_id, "event published (no subscribers)");
            }
        }
    }

    /// Subscribe to receive events
    pub fn subscribe(&self) -> EventSubscriber {
        let receiver = self.sender.subscribe();
        self.subscriber_count.fetch_add(1, Ordering::SeqCst);
        EventSubscriber {
            receiver,
            subscriber_count: self.subscriber_count.clone(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count.load(Ordering::SeqCst)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receives events from the bus
pub struct EventSubscriber {
    receiver: broadcast::Receiver<EventMessage>,
    subscriber_count: Arc<AtomicUsize>,
}

impl EventSubscriber {
    /// Receive the next event. Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<EventMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "event subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for EventSubscriber {
    fn drop(&mut self) {
        self.subscriber_count.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Shared event bus type
pub type SharedEventBus = Arc<EventBus>;

/// Create a shared event bus
pub fn create_event_bus() -> SharedEventBus {
    Arc::new(EventBus::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LeasePhase;
    use crate::notifications::events::PhaseChangedEvent;

    fn phase_event(id: &str) -> LeaseEvent {
        LeaseEvent::PhaseChanged(PhaseChangedEvent {
            reservation_id: id.to_string(),
            phase: LeasePhase::Counting,
            remaining_ms: 900_000,
        })
    }

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let bus = EventBus::new();
        let mut subscriber = bus.subscribe();

        bus.publish(phase_event("res-001"));

        let received = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            subscriber.recv(),
        )
        .await
        .expect("timeout")
        .expect("no message");

        assert_eq!(received.event.event_type(), "phase_changed");
        assert_eq!(received.event.reservation_id(), "res-001");
    }

    #[test]
    fn subscriber_count_tracks_drops() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);

        let sub1 = bus.subscribe();
        let sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(sub1);
        assert_eq!(bus.subscriber_count(), 1);
        drop(sub2);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.publish(phase_event("res-001"));
    }
}
