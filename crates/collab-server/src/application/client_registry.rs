//! ClientRegistry: the bounded set of currently connected clients.
//!
//! A handle is in the registry if and only if its connection handler is
//! running and has not finished teardown.  The registry is what the
//! admission controller consults to enforce `max_clients`, and what the
//! broadcaster snapshots to find the recipients of an edit.
//!
//! # Consistency
//!
//! Every operation takes the same async mutex, so registration, removal, and
//! snapshots are totally ordered.  A snapshot is a cloned `Vec`, never a view:
//! fan-out runs after the lock is released, and a client removed before the
//! snapshot was taken can never appear in it.
//!
//! Iteration order is not guaranteed; the service has no notion of client
//! order.

use std::collections::HashMap;

use collab_core::ClientId;
use thiserror::Error;
use tokio::sync::Mutex;

use super::client_handle::ClientHandle;

/// Why a connection was not admitted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdmissionError {
    /// The registry already holds `max` clients.
    #[error("server is full ({max} clients connected)")]
    Full { max: usize },

    /// A handle with the same id is already registered.
    #[error("client {0} is already registered")]
    Duplicate(ClientId),
}

/// In-memory registry of live client handles, keyed by client id.
pub struct ClientRegistry {
    max_clients: usize,
    clients: Mutex<HashMap<ClientId, ClientHandle>>,
}

impl ClientRegistry {
    pub fn new(max_clients: usize) -> Self {
        Self {
            max_clients,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_clients(&self) -> usize {
        self.max_clients
    }

    /// Admits `handle` if there is room, as one atomic check-and-insert.
    ///
    /// Returns the number of registered clients after the insertion.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Full`] when `max_clients` handles are
    /// already registered; the handle is not stored.
    pub async fn register(&self, handle: ClientHandle) -> Result<usize, AdmissionError> {
        let mut clients = self.clients.lock().await;
        if clients.len() >= self.max_clients {
            return Err(AdmissionError::Full {
                max: self.max_clients,
            });
        }
        if clients.contains_key(&handle.id()) {
            return Err(AdmissionError::Duplicate(handle.id()));
        }
        clients.insert(handle.id(), handle);
        Ok(clients.len())
    }

    /// Removes a client.  Returns `false` if it was already gone, which is
    /// not an error: teardown may race with a forced removal.
    pub async fn deregister(&self, id: ClientId) -> bool {
        self.clients.lock().await.remove(&id).is_some()
    }

    /// All registered handles except `excluded`, for broadcasting an edit
    /// to everyone but its originator.
    pub async fn snapshot_except(&self, excluded: ClientId) -> Vec<ClientHandle> {
        self.clients
            .lock()
            .await
            .values()
            .filter(|h| h.id() != excluded)
            .cloned()
            .collect()
    }

    /// All registered handles.
    #[cfg(test)]
    pub async fn snapshot(&self) -> Vec<ClientHandle> {
        self.clients.lock().await.values().cloned().collect()
    }

    pub async fn count(&self) -> usize {
        self.clients.lock().await.len()
    }

    #[cfg(test)]
    pub async fn contains(&self, id: ClientId) -> bool {
        self.clients.lock().await.contains_key(&id)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
