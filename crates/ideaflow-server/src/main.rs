//! Ideaflow Orchestrator Server

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use ideaflow_server::{http, AppState, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load config and wire state
    let config = Config::from_env();
    let addr: SocketAddr = config.bind_addr.parse()?;
    let state = AppState::new(config);

    let router = http::create_router(state);

    info!(addr = %addr, "Starting Ideaflow orchestrator");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
