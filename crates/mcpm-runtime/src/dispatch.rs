//! Dispatcher: classifies server output and forwards it to a sink.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, trace};

use mcpm_events::EventSink;
use mcpm_models::{truncate, InPacket, DEFAULT_TRUNCATE_LEN};

use crate::manager::ServerProcessManager;

/// Reads lines from one manager until shutdown.
pub struct Dispatcher {
    manager: Arc<ServerProcessManager>,
    sink: Arc<dyn EventSink>,
    shutdown: watch::Receiver<bool>,
}

impl Dispatcher {
    pub fn new(
        manager: Arc<ServerProcessManager>,
        sink: Arc<dyn EventSink>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            manager,
            sink,
            shutdown,
        }
    }

    /// Runs the dispatch loop until the shutdown signal.
    ///
    /// Lines that fail classification are logged and skipped.
    pub async fn run(&mut self) {
        debug!(server = %self.manager.id(), "starting dispatcher");

        loop {
            tokio::select! {
                packet = self.manager.input() => {
                    self.dispatch(packet);
                }
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        debug!(server = %self.manager.id(), "dispatcher received shutdown signal");
                        break;
                    }
                }
            }
        }

        debug!(server = %self.manager.id(), "dispatcher stopped");
    }

    fn dispatch(&self, packet: InPacket) {
        match self.manager.classify(&packet.line) {
            Ok(event) => {
                trace!(
                    server = %packet.server_id,
                    kind = ?event.kind_tag(),
                    "line classified"
                );
                self.manager.observe(&event);
                self.sink.publish(event);
            }
            Err(e) => {
                error!(
                    server = %packet.server_id,
                    error = %e,
                    line = %truncate(&packet.line, DEFAULT_TRUNCATE_LEN),
                    "failed to classify line"
                );
            }
        }
    }
}
