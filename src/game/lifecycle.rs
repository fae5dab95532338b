//! Player lifecycle: admission, disconnect and staleness eviction

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SpawnConfig;
use crate::ws::protocol::ServerMsg;
use crate::ws::registry::{ConnectionHandle, ConnectionRegistry, OutboundFrame};

use super::store::PlayerStore;

/// Per-connection state machine. `Disconnected` and `TimedOut` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Connecting,
    Active,
    /// Transport closed, errored or the server shut down
    Disconnected,
    /// Evicted for lack of input before the transport closed
    TimedOut,
}

impl ConnectionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Disconnected | Self::TimedOut)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("connection closed before welcome could be queued")]
    TransportClosed,

    #[error("player id {0} already in use")]
    DuplicateId(Uuid),

    #[error("failed to encode welcome: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Creates and destroys player state in step with connections
pub struct Lifecycle {
    store: Arc<PlayerStore>,
    registry: Arc<ConnectionRegistry>,
    spawn: SpawnConfig,
    stale_timeout: Duration,
}

impl Lifecycle {
    pub fn new(
        store: Arc<PlayerStore>,
        registry: Arc<ConnectionRegistry>,
        spawn: SpawnConfig,
        stale_timeout: Duration,
    ) -> Self {
        Self {
            store,
            registry,
            spawn,
            stale_timeout,
        }
    }

    pub fn store(&self) -> &Arc<PlayerStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Admit a new connection: assign an id, queue the welcome, spawn the
    /// player and register the outbound queue.
    pub fn connect(&self, outbound: mpsc::Sender<OutboundFrame>) -> Result<Uuid, LifecycleError> {
        self.connect_with_id(Uuid::new_v4(), outbound)
    }

    fn connect_with_id(
        &self,
        id: Uuid,
        outbound: mpsc::Sender<OutboundFrame>,
    ) -> Result<Uuid, LifecycleError> {
        if self.registry.contains(&id) || self.store.contains(&id) {
            return Err(LifecycleError::DuplicateId(id));
        }

        // Queued before registration so it precedes every snapshot
        let welcome: OutboundFrame = serde_json::to_string(&ServerMsg::Welcome { id })?.into();
        outbound
            .try_send(welcome)
            .map_err(|_| LifecycleError::TransportClosed)?;

        if !self.store.spawn(id, &self.spawn, Instant::now()) {
            return Err(LifecycleError::DuplicateId(id));
        }
        if !self.registry.register(ConnectionHandle { id, outbound }) {
            self.store.remove(&id);
            return Err(LifecycleError::DuplicateId(id));
        }

        info!(
            player_id = %id,
            players = self.store.len(),
            "Player joined"
        );
        Ok(id)
    }

    /// Tear down a connection's registry entry and player state.
    /// Safe to call more than once; reports `TimedOut` if eviction got there first.
    pub fn disconnect(&self, id: &Uuid) -> ConnectionPhase {
        let had_connection = self.registry.unregister(id).is_some();
        let had_player = self.store.remove(id).is_some();

        if had_connection || had_player {
            info!(
                player_id = %id,
                players = self.store.len(),
                "Player left"
            );
            ConnectionPhase::Disconnected
        } else {
            debug!(player_id = %id, "Player already evicted");
            ConnectionPhase::TimedOut
        }
    }

    /// Evict every player with no input for longer than the staleness timeout
    pub fn evict_stale(&self, now: Instant) -> Vec<Uuid> {
        let evicted = self.store.remove_stale(now, self.stale_timeout);
        for id in &evicted {
            self.registry.unregister(id);
            warn!(
                player_id = %id,
                timeout_secs = self.stale_timeout.as_secs_f32(),
                "Evicted stale player"
            );
        }
        evicted
    }
}
