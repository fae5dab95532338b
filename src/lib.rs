//! Authoritative game-state synchronization for a multiplayer 2D platformer.
//!
//! Clients connect over WebSocket, stream their held keys, and receive world
//! snapshots at a fixed rate while the server owns all physics.

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod util;
pub mod ws;
