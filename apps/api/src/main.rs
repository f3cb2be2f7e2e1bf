//! # Receets API Server
//!
//! ```text
//! load config ──► open SQLite (migrations) ──► PosEngine ──► axum::serve
//!                                                               │
//!                                          Ctrl+C / SIGTERM ────┘ graceful shutdown
//! ```

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use receets_api::{router, ApiConfig, AppState};
use receets_db::Database;
use receets_engine::{PosEngine, UnconfiguredGateway};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting Receets API server...");

    let config = ApiConfig::load().context("Failed to load configuration")?;
    let addr = config.socket_addr()?;
    info!(
        %addr,
        db_path = %config.database.path.display(),
        currency = %config.engine.currency,
        "Configuration loaded"
    );

    let db = Database::new(config.database.db_config())
        .await
        .context("Failed to open database")?;

    warn!("No payment processor configured: gateway payments and refunds will fail");
    let engine = PosEngine::new(db.clone(), Arc::new(UnconfiguredGateway), config.engine);
    let app = router(AppState::new(engine));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,receets=debug,sqlx=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
