//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Held-key state for the sender's player
    Input {
        #[serde(default, deserialize_with = "truthy")]
        left: bool,
        #[serde(default, deserialize_with = "truthy")]
        right: bool,
        #[serde(default, deserialize_with = "truthy")]
        up: bool,
    },

    /// Liveness only, never answered
    Ping,

    /// Any other `type` tag
    #[serde(other)]
    Unknown,
}

/// Accepts `true`/`false` and numeric flags; every other shape reads as `false`
fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        _ => false,
    })
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Sent once, right after the connection is accepted
    Welcome { id: Uuid },

    /// Authoritative world snapshot
    State {
        /// Server wall clock at snapshot time, Unix millis
        tick: u64,
        players: Vec<PlayerSnapshot>,
    },
}

/// Player state in a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlayerSnapshot {
    pub id: Uuid,
    /// Position X
    pub x: f32,
    /// Position Y (down is positive)
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
}
