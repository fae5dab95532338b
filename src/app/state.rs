//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{Lifecycle, PlayerStore};
use crate::util::shutdown::Shutdown;
use crate::ws::ConnectionRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub lifecycle: Arc<Lifecycle>,
    pub shutdown: Shutdown,
}

impl AppState {
    pub fn new(config: Config, shutdown: Shutdown) -> Self {
        let config = Arc::new(config);

        let store = Arc::new(PlayerStore::new());
        let registry = Arc::new(ConnectionRegistry::new());
        let lifecycle = Arc::new(Lifecycle::new(
            store,
            registry,
            config.spawn,
            config.stale_timeout,
        ));

        Self {
            config,
            lifecycle,
            shutdown,
        }
    }

    pub fn store(&self) -> &Arc<PlayerStore> {
        self.lifecycle.store()
    }
}
