//! The publishing side of event delivery.

use std::sync::Arc;

use mcpm_models::ClassifiedEvent;
use tokio::sync::mpsc;
use tracing::debug;

/// Receives classified events from server managers.
///
/// Publishing never blocks and never fails from the manager's point of
/// view; a sink that cannot deliver drops the event.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: ClassifiedEvent);
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn publish(&self, event: ClassifiedEvent) {
        (**self).publish(event)
    }
}

impl EventSink for mpsc::UnboundedSender<ClassifiedEvent> {
    fn publish(&self, event: ClassifiedEvent) {
        if let Err(e) = self.send(event) {
            debug!(event = %e.0.id(), "Event dropped, receiver closed");
        }
    }
}
