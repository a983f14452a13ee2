//! Transit Server - Main entry point

use anyhow::Result;
use std::net::SocketAddr;
use tokio::signal;
use tracing::info;
use transit_common::logging::{init_logging, LogConfig};
use transit_ingest::{IngestConfig, PipelineContext};
use transit_server::{config::ServerConfig, create_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let log_config = LogConfig::builder()
        .log_file_prefix("transit-server")
        .filter_directives("transit_server=debug,transit_ingest=debug,tower_http=debug,sqlx=warn")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    init_logging(&log_config)?;

    info!("Starting transit server");

    let server_config = ServerConfig::from_env();
    server_config.validate().map_err(anyhow::Error::msg)?;

    let ingest_config = IngestConfig::load()?;
    info!(dataset = %ingest_config.dataset, "Configuration loaded");

    let state = AppState {
        context: PipelineContext::from_config(ingest_config)?,
    };

    let app = create_router(state);

    let addr: SocketAddr = server_config.bind_address().parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down gracefully");

    Ok(())
}

async fn shutdown_signal() {
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
}
