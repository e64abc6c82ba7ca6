//! Account endpoints: signup, login, logout, password change, WS tickets.

use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthedUser};
use crate::auth::{self, NewAccount};
use crate::models::UserProfile;

#[derive(Serialize)]
pub struct SessionResponse {
    pub user: UserProfile,
    pub token: String,
}

/// `POST /api/auth/signup` — create a patient or doctor account.
pub async fn signup(
    State(ctx): State<ApiContext>,
    Json(account): Json<NewAccount>,
) -> Result<Json<SessionResponse>, ApiError> {
    let conn = ctx.state.open_db()?;
    let (user, token) = auth::signup(&conn, &account)?;
    Ok(Json(SessionResponse { user, token }))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `POST /api/auth/login` — password login.
pub async fn login(
    State(ctx): State<ApiContext>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let conn = ctx.state.open_db()?;
    let (user, token) = auth::login(&conn, &request.email, &request.password)?;
    Ok(Json(SessionResponse { user, token }))
}

#[derive(Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// `POST /api/auth/logout` — end the current session.
pub async fn logout(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<AuthedUser>,
    headers: axum::http::HeaderMap,
) -> Result<Json<OkResponse>, ApiError> {
    let token = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    let conn = ctx.state.open_db()?;
    auth::logout(&conn, token)?;
    Ok(Json(OkResponse { ok: true }))
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// `POST /api/auth/change-password` — local validation first, then rehash.
pub async fn change_password(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let conn = ctx.state.open_db()?;
    auth::change_password(
        &conn,
        &user.id,
        &request.current_password,
        &request.new_password,
        &request.confirm_password,
    )?;
    Ok(Json(OkResponse { ok: true }))
}

#[derive(Serialize)]
pub struct WsTicketResponse {
    pub ticket: String,
    pub expires_in_secs: u64,
}

/// `POST /api/auth/ws-ticket` — one-time WebSocket upgrade ticket.
pub async fn ws_ticket(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
) -> Result<Json<WsTicketResponse>, ApiError> {
    let ticket = {
        let mut tickets = ctx
            .ws_tickets
            .lock()
            .map_err(|_| ApiError::Internal("ticket lock".into()))?;
        tickets.issue(user.id, user.role)
    };

    Ok(Json(WsTicketResponse {
        ticket,
        expires_in_secs: 30,
    }))
}
