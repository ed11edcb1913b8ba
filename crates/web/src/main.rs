use anyhow::Context;
use gateway::{RazorpayClient, RazorpayConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use storage::{Database, MemoryStore, Store};

mod app;
mod config;
mod docs;
mod error;
mod features;
mod middleware;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("Starting hackathon registration API");

    let config = Config::from_env().context("Failed to load API configuration")?;
    tracing::info!("Configuration loaded successfully");

    let store: Arc<dyn Store> = if config.uses_memory_store() {
        tracing::warn!("Using the in-memory store; data is lost on exit");
        Arc::new(MemoryStore::new())
    } else {
        tracing::info!("Connecting to database at: {}", config.redacted_database_url());
        let db = Database::new(&config.database_url)
            .await
            .context("Failed to initialize database")?;
        tracing::info!("Database connection established");

        tracing::info!("Running database migrations");
        db.run_migrations()
            .await
            .context("Failed to run migrations")?;
        tracing::info!("Database migrations completed successfully");
        Arc::new(db)
    };

    let gateway = RazorpayClient::new(RazorpayConfig {
        base_url: config.razorpay_base_url.clone(),
        key_id: config.razorpay_key_id.clone(),
        key_secret: config.razorpay_key_secret.clone(),
        timeout: config.gateway_timeout,
    })
    .context("Failed to build payment gateway client")?;

    let state = AppState::new(&config, store, Arc::new(gateway));
    if state.api_keys.is_empty() {
        tracing::warn!("API_KEYS is empty; admin endpoints will reject every request");
    }

    let bind_address = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;
    tracing::info!("Starting server at http://{}", bind_address);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", bind_address);

    axum::serve(
        listener,
        app::app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}
