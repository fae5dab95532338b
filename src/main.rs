//! Platform Sync Server - Authoritative multiplayer platformer server
//!
//! This is the main entry point for the game server. It runs:
//! - WebSocket sessions that feed player input into the shared store
//! - A fixed-tick physics simulation over every connected player
//! - A lower-rate broadcaster that fans world snapshots out to all clients

use std::net::SocketAddr;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use platform_sync_server::app::AppState;
use platform_sync_server::config::{Config, LogFormat};
use platform_sync_server::game::{Broadcaster, Simulation};
use platform_sync_server::http::build_router;
use platform_sync_server::util::shutdown::{self, ShutdownTrigger};
use platform_sync_server::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level, config.log_format);

    // Initialize server time tracking
    init_server_time();

    info!("Starting Platform Sync Server");
    info!(
        tick_rate = config.tick_rate,
        broadcast_rate = config.broadcast_rate,
        stale_timeout_secs = config.stale_timeout.as_secs_f32(),
        "Simulation settings"
    );

    let (trigger, shutdown) = shutdown::channel();

    // Bind before any loop starts; this is the only fatal failure
    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    // Create application state
    let state = AppState::new(config.clone(), shutdown.clone());

    // Spawn the physics and broadcast loops
    let simulation = Simulation::new(state.store().clone(), &config);
    let simulation = tokio::spawn(simulation.run(shutdown.clone()));
    let broadcaster = Broadcaster::new(state.lifecycle.clone(), config.broadcast_rate);
    let broadcaster = tokio::spawn(broadcaster.run(shutdown.clone()));

    // Build router
    let router = build_router(state);

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(trigger))
        .await;

    // The trigger lives in the signal future; once serve returns it has been
    // fired or dropped, and either one stops the loops and open sessions
    if !shutdown.is_triggered() {
        info!("Server stopped without a signal, stopping loops");
    }

    let _ = simulation.await;
    let _ = broadcaster.await;

    served?;
    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str, format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init(),
    }
}

/// Graceful shutdown signal handler; fans the signal out to every loop
async fn shutdown_signal(trigger: ShutdownTrigger) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }

    trigger.trigger();
}
