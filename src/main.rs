use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use iruvade_api::app;
use iruvade_api::config::AppConfig;
use iruvade_api::database::PgStore;
use iruvade_api::state::AppState;
use iruvade_api::storage::DriveClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;
    config.require_server_secrets()?;
    tracing::info!("Starting Iruvade API in {:?} mode", config.environment);

    let store = PgStore::connect(&config.database)
        .await
        .context("connecting to the database")?;

    let drive = DriveClient::new(config.drive.clone())?;
    drive.authorize().await.context("authorizing Google Drive access")?;

    let port = config.api.port;
    let state = AppState::new(config, Arc::new(store), Arc::new(drive));
    let router = app::router(state);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Iruvade API listening on http://{}", bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
