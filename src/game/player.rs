//! Authoritative per-player state

use std::time::Instant;
use uuid::Uuid;

use crate::ws::protocol::PlayerSnapshot;

/// Held keys as last reported by the client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerInput {
    pub left: bool,
    pub right: bool,
    pub up: bool,
}

impl PlayerInput {
    /// -1, 0 or 1
    pub fn horizontal_axis(&self) -> f32 {
        f32::from(u8::from(self.right)) - f32::from(u8::from(self.left))
    }
}

/// Simulation fields, written only by the physics loop
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Body {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub on_ground: bool,
}

impl Body {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }
}

/// Client-driven fields, written only by the owning connection's handler
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Control {
    pub input: PlayerInput,
    pub last_seen: Instant,
}

/// Player state (authoritative)
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub id: Uuid,
    pub body: Body,
    pub control: Control,
}

impl PlayerState {
    pub fn new(id: Uuid, spawn_x: f32, spawn_y: f32, now: Instant) -> Self {
        Self {
            id,
            body: Body::at(spawn_x, spawn_y),
            control: Control {
                input: PlayerInput::default(),
                last_seen: now,
            },
        }
    }

    pub fn is_stale(&self, now: Instant, timeout: std::time::Duration) -> bool {
        now.saturating_duration_since(self.control.last_seen) > timeout
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id,
            x: self.body.x,
            y: self.body.y,
            vx: self.body.vx,
            vy: self.body.vy,
        }
    }
}
