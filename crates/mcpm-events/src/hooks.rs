//! One-shot event hooks.

use std::sync::{Mutex, MutexGuard, PoisonError};

use mcpm_models::ClassifiedEvent;
use tokio::sync::oneshot;

use crate::filter::EventFilter;

struct Waiter {
    filter: EventFilter,
    tx: oneshot::Sender<ClassifiedEvent>,
}

/// Waiters notified exactly once, by the first event matching their filter.
///
/// A waiter whose receiver was dropped is discarded at the next
/// [`fire`](EventHooks::fire).
#[derive(Default)]
pub struct EventHooks {
    waiters: Mutex<Vec<Waiter>>,
}

impl EventHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a waiter for the next event matching `filter`.
    pub fn once(&self, filter: EventFilter) -> oneshot::Receiver<ClassifiedEvent> {
        let (tx, rx) = oneshot::channel();
        self.lock().push(Waiter { filter, tx });
        rx
    }

    /// Delivers `event` to every waiting hook it matches and removes them.
    ///
    /// Returns how many hooks were notified.
    pub fn fire(&self, event: &ClassifiedEvent) -> usize {
        let mut waiters = self.lock();
        let mut notified = 0;
        for waiter in std::mem::take(&mut *waiters) {
            if waiter.tx.is_closed() {
                continue;
            }
            if waiter.filter.matches(event) {
                if waiter.tx.send(event.clone()).is_ok() {
                    notified += 1;
                }
            } else {
                waiters.push(waiter);
            }
        }
        notified
    }

    /// Number of hooks still waiting.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Drops every waiting hook; their receivers see a closed channel.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Waiter>> {
        // Waiters hold no invariant a panicking holder could break.
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for EventHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHooks")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpm_models::{EventKind, EventKindTag, LogHeader, LogTime, ServerId};

    fn rcon_ready(server: &str) -> ClassifiedEvent {
        ClassifiedEvent::from_header(
            ServerId::new(server),
            "raw",
            LogHeader {
                time: LogTime::new(10, 0, 0),
                thread: "Server thread".to_string(),
                level: "INFO".to_string(),
                content: "RCON running on 0.0.0.0:25575".to_string(),
            },
            EventKind::RconReady {
                address: Some("0.0.0.0:25575".to_string()),
            },
        )
    }

    #[tokio::test]
    async fn test_hook_fires_once() {
        let hooks = EventHooks::new();
        let rx = hooks.once(EventFilter::new().with_kind(EventKindTag::RconReady));

        assert_eq!(hooks.fire(&ClassifiedEvent::unstructured("srv".into(), "x")), 0);
        assert_eq!(hooks.pending(), 1);

        assert_eq!(hooks.fire(&rcon_ready("srv")), 1);
        assert_eq!(hooks.fire(&rcon_ready("srv")), 0);
        assert_eq!(hooks.pending(), 0);

        let event = rx.await.unwrap();
        assert_eq!(event.kind_tag(), EventKindTag::RconReady);
    }

    #[tokio::test]
    async fn test_hooks_are_server_specific() {
        let hooks = EventHooks::new();
        let filter = EventFilter::new().with_kind(EventKindTag::RconReady);
        let lobby = hooks.once(filter.clone().with_server_id("lobby".into()));
        let survival = hooks.once(filter.with_server_id("survival".into()));

        assert_eq!(hooks.fire(&rcon_ready("survival")), 1);
        assert!(survival.await.unwrap().is_from_server("survival"));
        assert_eq!(hooks.pending(), 1);
        drop(lobby);
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let hooks = EventHooks::new();
        drop(hooks.once(EventFilter::new()));
        assert_eq!(hooks.fire(&rcon_ready("srv")), 0);
        assert_eq!(hooks.pending(), 0);
    }

    #[tokio::test]
    async fn test_clear_closes_receivers() {
        let hooks = EventHooks::new();
        let rx = hooks.once(EventFilter::new());
        hooks.clear();
        assert!(rx.await.is_err());
    }
}
