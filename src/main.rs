use log::{error, info};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use learnserver::core::shared::utils::{create_conn, redact_database_url, run_migrations};
use learnserver::{run_axum_server, AppConfig, AppState};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,learnserver=debug,tower_http=info")),
        )
        .init();

    let config = AppConfig::load().map_err(|e| {
        error!("Configuration error: {:#}", e);
        std::io::Error::other(e.to_string())
    })?;

    info!(
        "Starting learnserver {} with database {}",
        env!("CARGO_PKG_VERSION"),
        redact_database_url(&config.database.url)
    );

    let pool = create_conn(&config.database).map_err(|e| {
        error!("Database connection failed: {:#}", e);
        std::io::Error::other(e.to_string())
    })?;

    run_migrations(&pool).map_err(|e| {
        error!("Failed to run migrations: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    let state = AppState::new(config, pool).map_err(|e| {
        error!("Failed to initialize application state: {:#}", e);
        std::io::Error::other(e.to_string())
    })?;

    run_axum_server(Arc::new(state)).await
}
