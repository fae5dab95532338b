//! Shared utilities

pub mod shutdown;
pub mod time;
