//! WebSocket transport: wire protocol, connection registry and sessions

pub mod handler;
pub mod protocol;
pub mod registry;

pub use registry::ConnectionRegistry;
