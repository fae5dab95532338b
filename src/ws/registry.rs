//! Registry of live WebSocket connections keyed by player id

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Serialized text frame queued for a connection's writer task
pub type OutboundFrame = Arc<str>;

/// Handle to a connection's outbound queue.
///
/// The registry holds the only sender; dropping the entry closes the queue
/// and the writer task shuts the socket.
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    pub id: Uuid,
    pub outbound: mpsc::Sender<OutboundFrame>,
}

pub struct ConnectionRegistry {
    connections: DashMap<Uuid, ConnectionHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Returns false if the id is already registered
    pub fn register(&self, handle: ConnectionHandle) -> bool {
        match self.connections.entry(handle.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(handle);
                true
            }
        }
    }

    pub fn unregister(&self, id: &Uuid) -> Option<ConnectionHandle> {
        self.connections.remove(id).map(|(_, h)| h)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.connections.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Copy of every handle, so sends happen without holding shard locks
    pub fn recipients(&self) -> Vec<ConnectionHandle> {
        self.connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
