use bjgas_api::config::Config;
use bjgas_api::coordinator::Coordinator;
use bjgas_api::gas_client::GasClient;
use bjgas_api::handlers::{self, AppState};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - The Beijing Gas client and its refresh coordinator.
/// - HTTP routes and middleware (tracing, CORS).
///
/// It then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bjgas_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let client = GasClient::new(config.base_url.clone(), config.credentials())?;
    tracing::info!("✓ Beijing Gas client initialized: {}", client.base_url());

    // First tick fires immediately, so data is available shortly after startup
    let coordinator = Arc::new(Coordinator::new(client, config.scan_interval()));
    coordinator.spawn();
    tracing::info!(
        "Refresh loop started (every {}s)",
        config.scan_interval_secs
    );

    let app = handlers::router(AppState { coordinator })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
