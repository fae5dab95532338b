//! Game simulation modules

pub mod broadcast;
pub mod lifecycle;
pub mod physics;
pub mod player;
pub mod simulation;
pub mod snapshot;
pub mod store;

pub use broadcast::Broadcaster;
pub use lifecycle::Lifecycle;
pub use simulation::Simulation;
pub use store::PlayerStore;
