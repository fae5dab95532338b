//! Player state store shared by the physics loop, the broadcaster and every
//! connection handler.
//!
//! A single lock guards the map. Writers only touch the fields they own:
//! [`PlayerStore::step_all`] hands out bodies, [`PlayerStore::apply_input`]
//! writes a single player's control record.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::SpawnConfig;
use crate::ws::protocol::PlayerSnapshot;

use super::player::{Body, PlayerInput, PlayerState};

#[derive(Debug, Default)]
pub struct PlayerStore {
    players: RwLock<HashMap<Uuid, PlayerState>>,
}

impl PlayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh player, offset from the spawn point by the number of
    /// players already present. Returns false if the id is taken.
    pub fn spawn(&self, id: Uuid, spawn: &SpawnConfig, now: Instant) -> bool {
        let mut players = self.players.write();
        if players.contains_key(&id) {
            return false;
        }
        let x = spawn.x + players.len() as f32 * spawn.spacing;
        players.insert(id, PlayerState::new(id, x, spawn.y, now));
        true
    }

    pub fn remove(&self, id: &Uuid) -> Option<PlayerState> {
        self.players.write().remove(id)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.players.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.players.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.read().is_empty()
    }

    pub fn get(&self, id: &Uuid) -> Option<PlayerState> {
        self.players.read().get(id).cloned()
    }

    /// Overwrite a player's input and mark it as seen.
    /// Returns false if the player is gone.
    pub fn apply_input(&self, id: &Uuid, input: PlayerInput, now: Instant) -> bool {
        match self.players.write().get_mut(id) {
            Some(player) => {
                player.control.input = input;
                player.control.last_seen = now;
                true
            }
            None => false,
        }
    }

    /// Run `f` over every player's body with that player's current input.
    /// Holds the write lock for the whole pass, so removals wait for it.
    pub fn step_all<F>(&self, mut f: F) -> usize
    where
        F: FnMut(&mut Body, PlayerInput),
    {
        let mut players = self.players.write();
        for player in players.values_mut() {
            let input = player.control.input;
            f(&mut player.body, input);
        }
        players.len()
    }

    /// Remove and return the ids of players not seen for longer than `timeout`
    pub fn remove_stale(&self, now: Instant, timeout: Duration) -> Vec<Uuid> {
        let mut stale = Vec::new();
        self.players.write().retain(|id, player| {
            let keep = !player.is_stale(now, timeout);
            if !keep {
                stale.push(*id);
            }
            keep
        });
        stale
    }

    /// Immutable copy of every player's public state
    pub fn snapshot(&self) -> Vec<PlayerSnapshot> {
        self.players.read().values().map(PlayerState::snapshot).collect()
    }
}
