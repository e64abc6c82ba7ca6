//! Doctor dashboard endpoint.

use axum::extract::State;
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthedUser};
use crate::dashboard::{self, DoctorStats};

/// `GET /api/dashboard/stats` — the signed-in doctor's work aggregates.
pub async fn stats(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
) -> Result<Json<DoctorStats>, ApiError> {
    let conn = ctx.state.open_db()?;
    let stats = dashboard::doctor_stats(&conn, &user.actor())?;
    Ok(Json(stats))
}
