pub mod admin;
pub mod api;
pub mod attachments;
pub mod auth;
pub mod cases;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod messaging;
pub mod models;
pub mod payments;
pub mod policy;
pub mod realtime;
pub mod state;
pub mod triage;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::ServiceConfig;
use crate::state::AppState;

/// Initialize tracing once. `RUST_LOG` overrides the built-in filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Bring the service up and serve until the process is stopped: read config
/// from the environment, prepare the data directory and database, bind, and
/// hand the router to axum.
pub async fn serve() -> std::io::Result<()> {
    let config = ServiceConfig::from_env();
    let state = Arc::new(AppState::from_config(&config)?);

    // Open once at startup so migrations run before the first request.
    state
        .open_db()
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "{} v{} listening", config::APP_NAME, config::APP_VERSION);

    let app = api::api_router(state);
    axum::serve(listener, app).await
}
