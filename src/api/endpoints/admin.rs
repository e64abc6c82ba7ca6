//! Admin endpoints: platform stats and account management.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::admin::{self, AdminStats};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthedUser};
use crate::models::enums::UserRole;
use crate::models::UserProfile;

/// `GET /api/admin/stats` — whole-platform aggregates.
pub async fn stats(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
) -> Result<Json<AdminStats>, ApiError> {
    let conn = ctx.state.open_db()?;
    let stats = admin::platform_stats(&conn, &user.actor())?;
    Ok(Json(stats))
}

#[derive(Deserialize)]
pub struct UserListQuery {
    pub role: Option<UserRole>,
}

/// `GET /api/admin/users` — all accounts, optionally narrowed to one role.
pub async fn users(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    let conn = ctx.state.open_db()?;
    let list = admin::list_users(&conn, &user.actor(), query.role)?;
    Ok(Json(list))
}

#[derive(Deserialize)]
pub struct SuspendRequest {
    pub reason: String,
}

/// `POST /api/admin/users/:id/suspend` — lock an account, revoke its
/// sessions and record the reason.
pub async fn suspend(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<SuspendRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    let conn = ctx.state.open_db()?;
    let profile = admin::suspend_user(&conn, &user.actor(), &id, &req.reason)?;
    Ok(Json(profile))
}

/// `POST /api/admin/users/:id/activate` — clear a suspension.
pub async fn activate(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserProfile>, ApiError> {
    let conn = ctx.state.open_db()?;
    let profile = admin::activate_user(&conn, &user.actor(), &id)?;
    Ok(Json(profile))
}
