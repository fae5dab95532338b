//! Snapshot building and statistics

use crate::util::time::unix_millis;
use crate::ws::protocol::ServerMsg;

use super::store::PlayerStore;

/// Serializes the store into `state` frames
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// Snapshot the store and serialize it, returning the player count alongside
    pub fn encode(store: &PlayerStore) -> Result<(String, usize), serde_json::Error> {
        let players = store.snapshot();
        let count = players.len();
        let msg = ServerMsg::State {
            tick: unix_millis(),
            players,
        };
        Ok((serde_json::to_string(&msg)?, count))
    }
}

/// Snapshot stats for debugging
#[derive(Debug, Default)]
pub struct SnapshotStats {
    pub total_snapshots: u64,
    pub total_bytes: u64,
    pub avg_players_per_snapshot: f32,
}

impl SnapshotStats {
    pub fn record(&mut self, player_count: usize, bytes: usize) {
        self.total_snapshots += 1;
        self.total_bytes += bytes as u64;

        // Running average
        let n = self.total_snapshots as f32;
        self.avg_players_per_snapshot =
            self.avg_players_per_snapshot * ((n - 1.0) / n) + (player_count as f32 / n);
    }
}
