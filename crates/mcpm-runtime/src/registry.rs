//! Registry of live server names.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use mcpm_models::ServerId;

use crate::error::{Result, RuntimeError};

/// Set of server names currently owned by a manager.
///
/// Cloning shares the same set. A name is taken with [`claim`](Self::claim)
/// and stays taken until the returned [`Registration`] is dropped.
#[derive(Debug, Clone, Default)]
pub struct ServerRegistry {
    names: Arc<Mutex<HashSet<ServerId>>>,
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes `id`, failing if another manager holds it.
    pub fn claim(&self, id: ServerId) -> Result<Registration> {
        if !self.lock().insert(id.clone()) {
            return Err(RuntimeError::DuplicateName(id));
        }
        debug!(server = %id, "server name registered");
        Ok(Registration {
            id,
            registry: self.clone(),
        })
    }

    pub fn contains(&self, id: &ServerId) -> bool {
        self.lock().contains(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<ServerId> {
        let mut names: Vec<_> = self.lock().iter().cloned().collect();
        names.sort();
        names
    }

    fn release(&self, id: &ServerId) {
        if self.lock().remove(id) {
            debug!(server = %id, "server name released");
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<ServerId>> {
        self.names.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Ownership of one registered name.
#[derive(Debug)]
pub struct Registration {
    id: ServerId,
    registry: ServerRegistry,
}

impl Registration {
    pub fn id(&self) -> &ServerId {
        &self.id
    }

    /// Releases the name now.
    pub fn release(self) {}
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.release(&self.id);
    }
}
