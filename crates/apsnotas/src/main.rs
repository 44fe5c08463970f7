//! apsnotas: an HTTP API that logs into the GVDasa APSWeb student portal,
//! scrapes the current grades and reports which subjects need attention.

mod boletim;
mod server;
mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::types::{AppConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env();
    let state = Arc::new(AppState::new(config));

    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    let router = server::create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("apsnotas listening on http://{addr}");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        return;
    }
    info!("shutdown signal received");
}
