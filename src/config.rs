use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Telecare";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter; RUST_LOG overrides it.
pub fn default_log_filter() -> String {
    format!("{}=info,tower_http=info", env!("CARGO_PKG_NAME"))
}

/// Get the application data directory
/// ~/Telecare/ unless TELECARE_DATA_DIR overrides it
pub fn app_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TELECARE_DATA_DIR") {
        return PathBuf::from(dir);
    }
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Telecare")
}

/// Get the SQLite database path
pub fn database_path() -> PathBuf {
    app_data_dir().join("telecare.db")
}

/// Get the attachment storage directory
pub fn attachments_dir() -> PathBuf {
    app_data_dir().join("attachments")
}

/// Everything the server reads from the environment at startup. Unset values
/// fall back to local-development defaults (Ollama's OpenAI-compatible
/// endpoint for the AI seam, a local listener for the payment provider).
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub ai_base_url: String,
    pub ai_api_key: String,
    pub ai_model: String,
    pub payment_base_url: String,
    pub payment_secret_key: String,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("TELECARE_BIND")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8787))),
            ai_base_url: env_or("TELECARE_AI_URL", "http://localhost:11434/v1"),
            ai_api_key: env_or("TELECARE_AI_KEY", ""),
            ai_model: env_or("TELECARE_AI_MODEL", "medgemma:4b"),
            payment_base_url: env_or("TELECARE_PAYMENT_URL", "http://localhost:4242"),
            payment_secret_key: env_or("TELECARE_PAYMENT_KEY", ""),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
