//! Main runtime: a set of server managers feeding one event bus.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use mcpm_events::{EventBus, EventFilter, EventSink, FilteredReceiver};
use mcpm_models::{ClassifiedEvent, CmdAction, EchoPacket, ServerId};

use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::error::{Result, RuntimeError};
use crate::manager::ServerProcessManager;
use crate::registry::ServerRegistry;

/// Runs managed servers and publishes their classified output.
pub struct Runtime {
    registry: ServerRegistry,
    bus: EventBus,
    managers: BTreeMap<ServerId, Arc<ServerProcessManager>>,
    /// One dispatcher task per server while started.
    dispatchers: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    started: bool,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_bus(EventBus::new())
    }

    /// Create a runtime publishing to an existing bus.
    pub fn with_bus(bus: EventBus) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            registry: ServerRegistry::new(),
            bus,
            managers: BTreeMap::new(),
            dispatchers: Vec::new(),
            shutdown_tx,
            shutdown_rx,
            started: false,
        }
    }

    /// Registers a server. Servers must be added before [`start`](Self::start).
    pub fn add_server(&mut self, config: ServerConfig) -> Result<Arc<ServerProcessManager>> {
        if self.started {
            return Err(RuntimeError::AlreadyStarted);
        }
        let manager = Arc::new(ServerProcessManager::new(config, &self.registry)?);
        info!(server = %manager.id(), "server added");
        self.managers
            .insert(manager.id().clone(), Arc::clone(&manager));
        Ok(manager)
    }

    /// Opens every server and starts dispatching their output.
    ///
    /// Servers that fail to open are logged; the first failure is returned
    /// after the others have been tried. Dispatchers run for every server
    /// either way, so a failed server can be reopened through its manager.
    pub async fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(RuntimeError::AlreadyStarted);
        }

        info!(servers = self.managers.len(), "starting runtime");

        let sink: Arc<dyn EventSink> = Arc::new(self.bus.clone());
        for manager in self.managers.values() {
            let mut dispatcher = Dispatcher::new(
                Arc::clone(manager),
                Arc::clone(&sink),
                self.shutdown_rx.clone(),
            );
            self.dispatchers
                .push(tokio::spawn(async move { dispatcher.run().await }));
        }
        self.started = true;

        let mut first_error = None;
        for manager in self.managers.values() {
            if let Err(e) = manager.open().await {
                error!(server = %manager.id(), error = %e, "failed to open server");
                first_error.get_or_insert(e);
            }
        }

        debug!("runtime started");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Sends a command to one server.
    pub async fn submit(&self, server: &ServerId, command: impl Into<String>) -> Result<EchoPacket> {
        self.manager(server)?.submit(command).await
    }

    /// Sends an action to one server.
    pub async fn submit_action(&self, server: &ServerId, action: &CmdAction) -> Result<EchoPacket> {
        self.manager(server)?.send_action(action).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClassifiedEvent> {
        self.bus.subscribe()
    }

    pub fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver {
        self.bus.subscribe_filtered(filter)
    }

    pub fn manager(&self, server: &ServerId) -> Result<&Arc<ServerProcessManager>> {
        self.managers
            .get(server)
            .ok_or_else(|| RuntimeError::UnknownServer(server.clone()))
    }

    /// Names of the managed servers, sorted.
    pub fn servers(&self) -> Vec<ServerId> {
        self.managers.keys().cloned().collect()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Stops dispatching, closes every server and releases their names.
    pub async fn shutdown(&mut self) -> Result<()> {
        if !self.started {
            return Err(RuntimeError::NotStarted);
        }

        info!("shutting down runtime");

        self.shutdown_tx.send(true).map_err(|e| {
            RuntimeError::Shutdown(format!("failed to send shutdown signal: {}", e))
        })?;

        debug!("waiting for dispatchers to stop");
        for handle in self.dispatchers.drain(..) {
            if let Err(e) = handle.await {
                error!(error = %e, "dispatcher task panicked");
            }
        }

        for (id, manager) in std::mem::take(&mut self.managers) {
            debug!(server = %id, "closing server");
            if let Err(e) = manager.close().await {
                error!(server = %id, error = %e, "failed to close server during shutdown");
            }
            manager.release();
        }

        self.started = false;
        info!("runtime stopped");
        Ok(())
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        // Stop dispatchers if the runtime was not shut down.
        let _ = self.shutdown_tx.send(true);
    }
}
