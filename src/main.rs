//! 5G IDS scoring server entry point

use std::net::SocketAddr;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ids_scoring::config::Config;
use ids_scoring::logic::service::ScoringService;
use ids_scoring::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env first so RUST_LOG can come from it
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "ids_scoring=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();

    tracing::info!("5G IDS scoring service starting...");
    tracing::info!("Features: {}", config.features_path.display());
    tracing::info!("Model: {}", config.model_path.display());

    // Startup failures are fatal: no scoring traffic without schema and model
    let service = ScoringService::initialize(&config)
        .context("Failed to initialize scoring service")?;

    let app = create_router(AppState::new(service));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
