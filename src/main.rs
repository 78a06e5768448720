//! Ficsit Relay - Signal-Satisfactory chat bridge
//!
//! Relays messages between a Signal group and a Satisfactory dedicated
//! server through the Ficsit Remote Monitoring HTTP API, and answers
//! status commands from Signal.

mod bridge;
mod common;
mod config;
mod game;
mod signal;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use bridge::{Bridge, BridgeSettings};
use config::{get_config_path, load_and_validate};
use game::{FrmClient, ServerApiClient};
use signal::{BridgeCommandHandler, SignalClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Ficsit Relay v{} starting...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = get_config_path();
    info!("Loading configuration from {}...", config_path);

    let config = load_and_validate(&config_path).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!("Please ensure {} is properly formatted.", config_path);
        e
    })?;

    info!("Configuration loaded successfully");
    info!("  Signal API: {}", config.signal.api_url);
    info!("  Signal account: {}", config.signal.phone_number);
    match &config.signal.group_id {
        Some(group_id) => info!("  Signal group: {}", group_id),
        None => info!("  Signal group: none (DM-only mode)"),
    }
    info!("  Game API: {}", config.game.api_url);
    if config.server.api_enabled() {
        info!("  Server API: {}", config.server.api_url);
    } else {
        info!("  Server API: not configured (admin commands disabled)");
    }

    // ============================================================
    // Create clients
    // ============================================================
    let game = Arc::new(FrmClient::new(&config.game)?);
    let chat = Arc::new(SignalClient::new(&config.signal)?);
    let mut commands = BridgeCommandHandler::new(game.clone(), config.server.clone());
    if config.server.api_enabled() {
        let admin = Arc::new(ServerApiClient::new(&config.server)?);
        if admin.health_check().await {
            info!("Dedicated server API is reachable");
        } else {
            warn!("Dedicated server API is not reachable yet - admin commands may fail");
        }
        commands = commands.with_admin(admin);
    }
    let commands = Arc::new(commands);

    if chat.health_check().await {
        info!("Signal API is reachable");
    } else {
        warn!("Signal API is not reachable yet - will keep retrying");
    }

    if game.health_check().await {
        info!("Game server is reachable");
    } else {
        warn!("Game server is not reachable yet - will keep retrying");
    }

    let bridge = Arc::new(Bridge::new(
        game,
        chat,
        commands,
        BridgeSettings::from_config(&config),
    ));

    if config.signal.group_id.is_some() {
        bridge.initialize_watermark().await;
    }

    // ============================================================
    // Run the bridge
    // ============================================================
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut bridge_task = {
        let bridge = bridge.clone();
        tokio::spawn(async move {
            bridge.run(shutdown_rx).await;
        })
    };

    let shutdown = tokio::select! {
        biased;
        _ = shutdown_signal() => {
            info!("Shutdown signal received - stopping bridge...");
            true
        }
        _ = &mut bridge_task => false,
    };

    if shutdown {
        if let Err(e) = shutdown_tx.send(true) {
            debug!("Shutdown channel closed (bridge already exited): {}", e);
        }
        match tokio::time::timeout(Duration::from_secs(5), bridge_task).await {
            Ok(Ok(())) => info!("Bridge stopped gracefully"),
            Ok(Err(e)) => warn!("Bridge task panicked: {}", e),
            Err(_) => warn!("Bridge shutdown timed out"),
        }
    }

    info!("Exiting...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
