//! Reviewer assignment service.
//!
//! Serves the HTTP API for creating, merging and reassigning pull requests
//! and for bulk deactivation of team members.

use std::sync::Arc;

use anyhow::Result;
use reviewers_service::{
    api,
    config::{self, StoreKind},
    db::Database,
    state::AppState,
    store::InMemoryStore,
};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = config::Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to REVIEWERS_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting reviewer service");
    info!(listen_addr = %config.listen_addr, store = ?config.store, "Configuration loaded");

    if config.admin_token.is_none() {
        warn!("REVIEWERS_ADMIN_TOKEN is not set; mutating routes are open");
    }

    let state = match config.store {
        StoreKind::Memory => {
            warn!("Using in-memory store; state is lost on restart");
            AppState::new(Arc::new(InMemoryStore::new()), config.admin_token.clone())
        }
        StoreKind::Postgres => {
            let db = match Database::connect(&config.database).await {
                Ok(db) => {
                    info!("Database connection established");
                    db
                }
                Err(e) => {
                    error!(error = %e, "Failed to connect to database");
                    return Err(e.into());
                }
            };

            // Run migrations in dev mode
            if config.dev_mode {
                info!("Running database migrations (dev mode)");
                if let Err(e) = db.run_migrations().await {
                    error!(error = %e, "Failed to run migrations");
                    return Err(e.into());
                }
            }

            AppState::new(Arc::new(db.store()), config.admin_token.clone())
        }
    };

    // Create shutdown channel for graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let app = api::create_router(state, config.request_timeout);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

    // Spawn the server with graceful shutdown
    let mut server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let mut shutdown_rx = shutdown_rx;
                loop {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
    });

    // Wait for shutdown signal (Ctrl+C)
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = &mut server_handle => {
            match result {
                Ok(Ok(())) => info!("Server exited normally"),
                Ok(Err(e)) => error!(error = %e, "Server error"),
                Err(e) => error!(error = %e, "Server task panicked"),
            }
            return Ok(());
        }
    }

    let _ = shutdown_tx.send(true);

    let shutdown_timeout = std::time::Duration::from_secs(10);
    if tokio::time::timeout(shutdown_timeout, server_handle)
        .await
        .is_err()
    {
        warn!("HTTP server did not shut down in time");
    }

    info!("Reviewer service shutdown complete");
    Ok(())
}
