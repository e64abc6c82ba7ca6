//! Request handlers, one module per resource.

pub mod admin;
pub mod auth;
pub mod cases;
pub mod dashboard;
pub mod health;
pub mod medications;
pub mod messages;
pub mod orders;
pub mod profiles;
pub mod triage;

use crate::api::error::ApiError;

/// Run blocking DB + outbound HTTP work on a dedicated thread. The AI and
/// payment clients block, so handlers that call them must not hold the
/// async runtime hostage.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "blocking task panicked");
            Err(ApiError::Internal("Background task failed".into()))
        }
    }
}
