//! Broadcast event bus.

use mcpm_models::ClassifiedEvent;
use tokio::sync::broadcast;
use tracing::warn;

use crate::error::{EventError, Result};
use crate::filter::EventFilter;
use crate::sink::EventSink;

/// Default number of events buffered per subscriber.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Fans classified events out to every subscriber.
///
/// A subscriber that falls more than the capacity behind skips the oldest
/// events rather than slowing the servers down.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ClassifiedEvent>,
}

impl EventBus {
    /// Creates a new EventBus with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a new EventBus with the given per-subscriber capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Sends an event to all subscribers.
    ///
    /// Returns how many subscribers it reached; with none it is dropped.
    pub fn emit(&self, event: ClassifiedEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribes to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<ClassifiedEvent> {
        self.sender.subscribe()
    }

    /// Subscribes to future events matching `filter`.
    pub fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver {
        FilteredReceiver {
            receiver: self.sender.subscribe(),
            filter,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for EventBus {
    fn publish(&self, event: ClassifiedEvent) {
        self.emit(event);
    }
}

/// A bus subscription that only yields events matching a filter.
#[derive(Debug)]
pub struct FilteredReceiver {
    receiver: broadcast::Receiver<ClassifiedEvent>,
    filter: EventFilter,
}

impl FilteredReceiver {
    /// Waits for the next matching event.
    ///
    /// Lag is logged and skipped. Fails only once the bus is gone.
    pub async fn recv(&mut self) -> Result<ClassifiedEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Ok(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return Err(EventError::Closed),
            }
        }
    }

    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpm_models::{EventKind, EventKindTag, LogHeader, LogTime, ServerId};

    fn log(server: &str, text: &str) -> ClassifiedEvent {
        ClassifiedEvent::unstructured(ServerId::new(server), text)
    }

    fn ready(server: &str) -> ClassifiedEvent {
        ClassifiedEvent::from_header(
            ServerId::new(server),
            "raw",
            LogHeader {
                time: LogTime::new(1, 2, 3),
                thread: "Server thread".to_string(),
                level: "INFO".to_string(),
                content: "RCON running on 0.0.0.0:25575".to_string(),
            },
            EventKind::RconReady { address: None },
        )
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.emit(log("srv", "x")), 0);
    }

    #[tokio::test]
    async fn test_every_subscriber_receives() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(log("srv", "hello"));
        assert_eq!(a.recv().await.unwrap().content(), "hello");
        assert_eq!(b.recv().await.unwrap().content(), "hello");
    }

    #[tokio::test]
    async fn test_filtered_receiver_skips_others() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_filtered(
            EventFilter::new()
                .with_server_id("lobby".into())
                .with_kind(EventKindTag::RconReady),
        );

        bus.publish(log("lobby", "noise"));
        bus.publish(ready("survival"));
        bus.publish(ready("lobby"));

        let event = rx.recv().await.unwrap();
        assert!(event.is_from_server("lobby"));
        assert_eq!(event.kind_tag(), EventKindTag::RconReady);
    }

    #[tokio::test]
    async fn test_filtered_receiver_survives_lag() {
        let bus = EventBus::with_capacity(2);
        let mut rx = bus.subscribe_filtered(EventFilter::new());
        for i in 0..5 {
            bus.publish(log("srv", &format!("line {}", i)));
        }

        let event = rx.recv().await.unwrap();
        assert_eq!(event.content(), "line 3");
    }

    #[tokio::test]
    async fn test_filtered_receiver_closed() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_filtered(EventFilter::new());
        drop(bus);
        assert_eq!(rx.recv().await.unwrap_err(), EventError::Closed);
    }
}
