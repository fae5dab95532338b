//! Authoritative fixed-tick physics loop

use std::sync::Arc;
use std::time::Instant;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::{Config, PhysicsConstants};
use crate::util::shutdown::Shutdown;
use crate::util::time::{clamp_dt, period_for_rate};

use super::physics::{PhysicsSystem, Platform};
use super::store::PlayerStore;

/// Advances every player in the store at a fixed rate
pub struct Simulation {
    store: Arc<PlayerStore>,
    platforms: Arc<[Platform]>,
    constants: PhysicsConstants,
    tick_rate: u32,
    max_dt: f32,
    tick: u64,
}

impl Simulation {
    pub fn new(store: Arc<PlayerStore>, config: &Config) -> Self {
        Self {
            store,
            platforms: config.platforms.clone().into(),
            constants: config.physics,
            tick_rate: config.tick_rate,
            max_dt: config.max_dt,
            tick: 0,
        }
    }

    /// Advance all players by `dt` seconds (clamped). Returns the number stepped.
    pub fn step(&mut self, dt: f32) -> usize {
        let dt = dt.clamp(0.0, self.max_dt);
        let platforms = &self.platforms;
        let constants = &self.constants;
        self.tick += 1;
        self.store.step_all(|body, input| {
            PhysicsSystem::step(body, input, dt, platforms, constants);
        })
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Run the tick loop until shutdown
    pub async fn run(mut self, mut shutdown: Shutdown) {
        info!(
            tick_rate = self.tick_rate,
            platforms = self.platforms.len(),
            "Simulation started"
        );

        let mut tick_interval = interval(period_for_rate(self.tick_rate));
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last = Instant::now();

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {}
                _ = shutdown.wait() => break,
            }

            let now = Instant::now();
            let dt = clamp_dt(now.duration_since(last), self.max_dt);
            last = now;
            self.step(dt);
        }

        debug!(ticks = self.tick, "Simulation stopped");
    }
}
