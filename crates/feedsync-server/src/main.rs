//! Feedsync Server - Main entry point

use anyhow::{Context, Result};
use feedsync_common::logging::{init_logging, LogConfig};
use feedsync_engine::{SyncConfig, SyncEngine};
use feedsync_server::{config::AppConfig, routes, scheduler, state::AppState};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with configuration from environment
    let log_config = LogConfig::builder()
        .log_file_prefix("feedsync-server".to_string())
        .filter_directives(
            "feedsync_server=debug,feedsync_engine=debug,tower_http=debug,axum=trace".to_string(),
        )
        .build();

    // Merge with environment variables (they take precedence)
    let log_config = LogConfig::from_env().unwrap_or(log_config);

    init_logging(&log_config)?;

    info!("Starting Feedsync Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    // Build the engine from the sync-side environment
    let sync_config = SyncConfig::from_env().context("invalid sync configuration")?;
    let engine = Arc::new(SyncEngine::new(sync_config)?);
    let state = AppState::new(engine);

    // Start the background scheduler if enabled
    let _scheduler_handle = scheduler::spawn(state.clone(), config.scheduler.clone());

    // Build the application router
    let app = routes::create_router(state, &config);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on {}", addr);

    // Start server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.shutdown_timeout_secs))
        .await?;

    info!("Server shut down gracefully");

    Ok(())
}

async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    // Give an in-flight run's HTTP callers time to observe the final state
    info!("Waiting up to {} seconds for connections to close", timeout_secs);
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
}
