//! Four-in-a-row match server
//!
//! This is the main entry point for the game server. It handles:
//! - WebSocket connections for matchmaking and live play
//! - Background sweeps for turn timeouts, inactivity and disconnects
//! - Bot opponents for players left waiting in the queue
//! - Supabase persistence and analytics events for finished matches

mod app;
mod config;
mod events;
mod game;
mod http;
mod matchmaking;
mod store;
mod util;
mod ws;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::Config;
use crate::http::build_router;
use crate::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize server time tracking
    init_server_time();

    info!("Starting four-in-a-row server");
    info!("Server address: {}", config.server_addr);
    if config.supabase.is_none() {
        warn!("SUPABASE_URL not set, finished matches will not be persisted");
    }
    if config.analytics_url.is_none() {
        info!("ANALYTICS_URL not set, analytics events are logged only");
    }

    // Create application state
    let (state, notices) = AppState::new(config.clone());

    // Background work: notice fan-out, sweeps, matchmaking, metrics
    tokio::spawn(state.hub.clone().run_dispatcher(state.registry.clone(), notices));
    tokio::spawn(state.registry.clone().run_disconnect_sweep());
    tokio::spawn(state.registry.clone().run_turn_sweep());
    tokio::spawn(state.registry.clone().run_metrics());
    tokio::spawn(state.matchmaker.clone().run());

    // Build router
    let router = build_router(state);

    // Start server
    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
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
}
