mod config;
mod db;
mod error;
mod event;
mod models;
mod routes;
mod services;
mod state;
mod store;

use std::sync::Arc;

use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("database init failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid CORS_ORIGIN: {0}")]
    Cors(#[from] axum::http::header::InvalidHeaderValue),
    #[error("server io: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "livechat failed to start");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    // A missing .env is fine; real deployments set the environment directly.
    let _ = dotenvy::dotenv();

    let config = config::Config::from_env()?;
    if config.jwt_secret_generated {
        warn!("JWT_SECRET not set; using a random secret, tokens will not survive a restart");
    }

    let pool = db::init_pool(&config).await?;
    let store = Arc::new(store::PgStore::new(pool));
    let state = state::AppState::new(store, &config);

    let app = routes::app(state.clone(), config.cors_origin.as_deref())?;
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;

    info!(port = config.port, "livechat listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;
    info!("livechat stopped");
    Ok(())
}

/// Wait for Ctrl-C, then tell live websocket connections to close so the
/// graceful shutdown can finish.
async fn shutdown_signal(state: state::AppState) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!(connections = state.chat.registry().connection_count(), "shutdown requested");
    state.begin_shutdown();
}
