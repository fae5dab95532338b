//! Periodic snapshot fan-out, independent of the physics tick

use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::util::shutdown::Shutdown;
use crate::util::time::period_for_rate;
use crate::ws::registry::{ConnectionHandle, OutboundFrame};

use super::lifecycle::Lifecycle;
use super::snapshot::{SnapshotBuilder, SnapshotStats};

/// Result of a single broadcast round
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    pub evicted: usize,
    pub players: usize,
    pub delivered: usize,
    pub failed: usize,
}

pub struct Broadcaster {
    lifecycle: Arc<Lifecycle>,
    period: Duration,
    stats: SnapshotStats,
}

impl Broadcaster {
    pub fn new(lifecycle: Arc<Lifecycle>, broadcast_rate: u32) -> Self {
        Self {
            lifecycle,
            period: period_for_rate(broadcast_rate),
            stats: SnapshotStats::default(),
        }
    }

    /// One round: evict stale players, snapshot the store and send it to
    /// every registered connection. Returns `None` when nobody is connected.
    pub async fn broadcast_once(&mut self, now: Instant) -> Option<BroadcastReport> {
        if self.lifecycle.registry().is_empty() {
            return None;
        }

        let evicted = self.lifecycle.evict_stale(now).len();

        let (raw, players) = match SnapshotBuilder::encode(self.lifecycle.store()) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!(error = %e, "Failed to encode snapshot");
                return None;
            }
        };
        self.stats.record(players, raw.len());

        let frame: OutboundFrame = raw.into();
        let recipients = self.lifecycle.registry().recipients();
        let results = join_all(
            recipients
                .iter()
                .map(|conn| send_frame(conn, frame.clone(), self.period)),
        )
        .await;

        let delivered = results.iter().filter(|ok| **ok).count();
        let report = BroadcastReport {
            evicted,
            players,
            delivered,
            failed: results.len() - delivered,
        };

        debug!(
            players = report.players,
            delivered = report.delivered,
            failed = report.failed,
            total_snapshots = self.stats.total_snapshots,
            total_bytes = self.stats.total_bytes,
            avg_players = self.stats.avg_players_per_snapshot,
            "Snapshot broadcast"
        );

        Some(report)
    }

    /// Run the broadcast loop until shutdown
    pub async fn run(mut self, mut shutdown: Shutdown) {
        info!(period_ms = self.period.as_millis() as u64, "Broadcaster started");

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.wait() => break,
            }

            tokio::select! {
                _ = self.broadcast_once(Instant::now()) => {}
                _ = shutdown.wait() => break,
            }
        }

        debug!(
            total_snapshots = self.stats.total_snapshots,
            "Broadcaster stopped"
        );
    }
}

/// Queue a frame for one connection, giving up after `timeout`.
/// Failures are logged and reported, never propagated.
async fn send_frame(conn: &ConnectionHandle, frame: OutboundFrame, timeout: Duration) -> bool {
    match conn.outbound.send_timeout(frame, timeout).await {
        Ok(()) => true,
        Err(SendTimeoutError::Timeout(_)) => {
            warn!(player_id = %conn.id, "Outbound queue full, snapshot dropped");
            false
        }
        Err(SendTimeoutError::Closed(_)) => {
            debug!(player_id = %conn.id, "Connection closed, snapshot dropped");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpawnConfig;
    use crate::game::player::PlayerInput;
    use crate::game::store::PlayerStore;
    use crate::util::shutdown;
    use crate::ws::registry::ConnectionRegistry;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    fn lifecycle() -> Arc<Lifecycle> {
        Arc::new(Lifecycle::new(
            Arc::new(PlayerStore::new()),
            Arc::new(ConnectionRegistry::new()),
            SpawnConfig::default(),
            Duration::from_secs(10),
        ))
    }

    fn connect(lifecycle: &Lifecycle, capacity: usize) -> (Uuid, mpsc::Receiver<OutboundFrame>) {
        let (tx, mut rx) = mpsc::channel(capacity);
        let id = lifecycle.connect(tx).unwrap();
        // Drain the welcome
        assert!(rx.try_recv().is_ok());
        (id, rx)
    }

    fn ids_in(frame: &str) -> Vec<String> {
        let value: serde_json::Value = serde_json::from_str(frame).unwrap();
        assert_eq!(value["type"], "state");
        value["players"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn nothing_sent_without_connections() {
        let lifecycle = lifecycle();
        let mut broadcaster = Broadcaster::new(lifecycle, 20);
        assert!(broadcaster.broadcast_once(Instant::now()).await.is_none());
    }

    #[tokio::test]
    async fn every_connection_gets_every_player() {
        let lifecycle = lifecycle();
        let (a, mut rx_a) = connect(&lifecycle, 4);
        let (b, mut rx_b) = connect(&lifecycle, 4);

        let mut broadcaster = Broadcaster::new(lifecycle.clone(), 20);
        let report = broadcaster.broadcast_once(Instant::now()).await.unwrap();
        assert_eq!(report.players, 2);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 0);

        for rx in [&mut rx_a, &mut rx_b] {
            let mut ids = ids_in(&rx.recv().await.unwrap());
            ids.sort();
            let mut expected = vec![a.to_string(), b.to_string()];
            expected.sort();
            assert_eq!(ids, expected);
        }
    }

    #[tokio::test]
    async fn dead_recipient_does_not_block_others() {
        let lifecycle = lifecycle();
        let (_a, rx_a) = connect(&lifecycle, 4);
        let (_b, mut rx_b) = connect(&lifecycle, 4);
        // A's socket writer is gone but the entry is still registered
        drop(rx_a);

        let mut broadcaster = Broadcaster::new(lifecycle.clone(), 20);
        let report = broadcaster.broadcast_once(Instant::now()).await.unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(ids_in(&rx_b.recv().await.unwrap()).len(), 2);
    }

    #[tokio::test]
    async fn full_queue_times_out_without_stalling_the_round() {
        let lifecycle = lifecycle();
        let (_slow, _rx_slow) = connect(&lifecycle, 1);
        let (_fast, mut rx_fast) = connect(&lifecycle, 4);

        let mut broadcaster = Broadcaster::new(lifecycle.clone(), 20);
        // First round fills the slow queue, second round cannot enqueue
        broadcaster.broadcast_once(Instant::now()).await.unwrap();
        let started = Instant::now();
        let report = broadcaster.broadcast_once(Instant::now()).await.unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(rx_fast.recv().await.is_some());
        assert!(rx_fast.recv().await.is_some());
    }

    #[tokio::test]
    async fn stale_player_is_excluded_from_snapshot() {
        let lifecycle = lifecycle();
        let (idle, mut rx_idle) = connect(&lifecycle, 4);
        let (active, mut rx_active) = connect(&lifecycle, 4);

        let now = Instant::now() + Duration::from_secs(11);
        lifecycle
            .store()
            .apply_input(&active, PlayerInput::default(), now);

        let mut broadcaster = Broadcaster::new(lifecycle.clone(), 20);
        let report = broadcaster.broadcast_once(now).await.unwrap();
        assert_eq!(report.evicted, 1);
        assert_eq!(report.players, 1);

        assert_eq!(ids_in(&rx_active.recv().await.unwrap()), vec![active.to_string()]);
        // The evicted connection gets no snapshot; its queue is closed
        assert!(rx_idle.recv().await.is_none());
        assert!(!lifecycle.store().contains(&idle));
    }

    #[tokio::test]
    async fn removed_player_never_reappears() {
        let lifecycle = lifecycle();
        let (gone, _rx_gone) = connect(&lifecycle, 4);
        let (_stay, mut rx_stay) = connect(&lifecycle, 4);

        lifecycle.disconnect(&gone);

        let mut broadcaster = Broadcaster::new(lifecycle.clone(), 20);
        broadcaster.broadcast_once(Instant::now()).await.unwrap();
        let ids = ids_in(&rx_stay.recv().await.unwrap());
        assert!(!ids.contains(&gone.to_string()));
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test]
    async fn run_broadcasts_then_stops() {
        let lifecycle = lifecycle();
        let (_id, mut rx) = connect(&lifecycle, 16);

        let (trigger, shutdown) = shutdown::channel();
        let handle = tokio::spawn(Broadcaster::new(lifecycle.clone(), 50).run(shutdown));

        let frame = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ids_in(&frame).len(), 1);

        trigger.trigger();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
