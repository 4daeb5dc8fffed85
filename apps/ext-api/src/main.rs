//! # Titan Extension API
//!
//! HTTP server for the container, manufacturing and loyalty modules.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Extension API Server                               │
//! │                                                                         │
//! │  Host POS ───► HTTP (8090) ───► Handlers ───► SQLite                   │
//! │                    │                                                    │
//! │                    └── /api/hooks/events ───► HookDispatcher            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```bash
//! # Serve
//! ext-api
//!
//! # Print a bearer token for local tooling
//! ext-api issue-token pos-terminal containers.manage hooks.dispatch
//! ```

use std::env;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use titan_ext_api::auth::JwtManager;
use titan_ext_api::{build_router, AppState, ExtConfig};
use titan_ext_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,titan_ext=debug,sqlx=warn")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config = ExtConfig::load().context("Failed to load configuration")?;
    let jwt = JwtManager::new(config.jwt_secret.clone(), config.jwt_lifetime_secs);

    let args: Vec<String> = env::args().collect();
    if args.get(1).map(String::as_str) == Some("issue-token") {
        let subject = args.get(2).map(String::as_str).unwrap_or("local");
        let permissions: Vec<&str> = args.iter().skip(3).map(String::as_str).collect();
        let token = jwt
            .issue_token(subject, &permissions)
            .map_err(|e| anyhow::anyhow!(e.message))?;
        println!("{}", token);
        return Ok(());
    }

    info!("Starting Titan Extension API server...");
    info!(
        addr = %config.listen_addr(),
        database = %config.database_path,
        "Configuration loaded"
    );
    if config.uses_dev_secret() {
        warn!("Using the development JWT secret; set TITAN_EXT_JWT_SECRET in production");
    }

    // Open database (runs migrations)
    let db = Database::new(
        DbConfig::new(&config.database_path).max_connections(config.max_connections),
    )
    .await
    .context("Failed to open database")?;
    info!("Database ready");

    let app = build_router(AppState::new(db.clone(), jwt));

    let listener = TcpListener::bind(config.listen_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr()))?;
    info!(addr = %config.listen_addr(), "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
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
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
