//! Bearer token authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, resolves the session row by
//! token hash, rejects expired or suspended accounts, and injects
//! [`AuthedUser`] into request extensions for downstream handlers.

use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthedUser};
use crate::auth::hash_token;
use crate::db::repository as repo;

/// Require a valid session token.
///
/// Accesses `ApiContext` from request extensions (injected by Extension
/// layer). On success: injects `AuthedUser` and bumps the session's
/// last-used timestamp.
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let token = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?
        .to_string();

    let token_hash = hash_token(&token);
    let user = {
        let conn = ctx.state.open_db()?;
        let now = repo::now_utc();

        let session =
            repo::get_session_user(&conn, &token_hash, now)?.ok_or(ApiError::Unauthorized)?;
        if !session.is_active {
            return Err(ApiError::Forbidden(
                "This account has been suspended".to_string(),
            ));
        }
        repo::touch_session(&conn, &token_hash, now)?;

        AuthedUser {
            id: session.user_id,
            role: session.role,
            full_name: session.full_name,
            email: session.email,
        }
    };

    req.extensions_mut().insert(user);

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert("Cache-Control", HeaderValue::from_static("no-store"));

    Ok(response)
}
