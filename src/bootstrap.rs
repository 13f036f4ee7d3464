//! Process-level setup shared by the binary: env, logging and serving.

use anyhow::{Context, Result};
use axum::Router;
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Loads `.env` when present. Real environment variables win.
pub fn init_env() {
    if let Ok(path) = dotenvy::dotenv() {
        info!(path = %path.display(), "Loaded environment file");
    }
}

/// `RUST_LOG` controls verbosity; defaults to `info`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

pub async fn serve(service_name: &str, addr: &str, app: Router) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("{service_name} listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("{service_name} shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {err}");
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down");
}
