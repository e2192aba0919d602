use agrihub::api::create_app;
use agrihub::config::load_or_default;
use agrihub::HubCoordinator;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agrihub=info".into()),
        )
        .init();

    info!("Agrihub starting...");

    let config_path = PathBuf::from(
        std::env::var("AGRIHUB_CONFIG").unwrap_or_else(|_| "agrihub.toml".to_string()),
    );
    let config = load_or_default(&config_path)?;

    info!(
        config = %config_path.display(),
        data_dir = %config.storage.directory.display(),
        default_interval_ms = config.sensors.default_interval_ms,
        "Configuration loaded"
    );

    let (hub, ingestion_handle) =
        HubCoordinator::spawn(&config).context("Failed to open hub coordinator")?;

    let address = config.server.socket_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!(address = %address, "Hub API listening");

    let router = create_app(hub.clone());
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "Hub API server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    hub.shutdown().await;
    ingestion_handle.abort();
    info!("Agrihub stopped");

    Ok(())
}
