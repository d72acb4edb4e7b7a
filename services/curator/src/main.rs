use anyhow::Result;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use curator::{AppState, config::CuratorConfig, routes};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging, RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting curator service");

    let config = CuratorConfig::load()?;
    info!(
        "Operating mode {} with {} AI provider(s)",
        config.server.mode,
        config.ai.providers.len()
    );

    let app_state = AppState::from_config(&config).await?;
    info!("Curator service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = TcpListener::bind(&config.server.bind).await?;
    info!("Curator service listening on {}", config.server.bind);

    axum::serve(listener, app).await?;

    Ok(())
}
