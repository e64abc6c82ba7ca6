//! Own-profile endpoints and the doctor directory.

use axum::extract::State;
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthedUser};
use crate::dashboard;
use crate::db::repository as repo;
use crate::models::{DoctorListing, ProfileUpdate, UserProfile};

/// `GET /api/profile` — the signed-in user's own profile.
pub async fn me(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
) -> Result<Json<UserProfile>, ApiError> {
    let conn = ctx.state.open_db()?;
    let profile = repo::get_profile(&conn, &user.id)?
        .ok_or_else(|| ApiError::NotFound("PROFILE_NOT_FOUND", "Profile not found".into()))?;
    Ok(Json(profile))
}

/// `PUT /api/profile` — patch the signed-in user's profile. Role and
/// activation state never change here; those are admin operations.
pub async fn update_me(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<UserProfile>, ApiError> {
    let conn = ctx.state.open_db()?;
    repo::update_profile(&conn, &user.id, &update, repo::now_utc())?;
    let profile = repo::get_profile(&conn, &user.id)?
        .ok_or_else(|| ApiError::NotFound("PROFILE_NOT_FOUND", "Profile not found".into()))?;
    Ok(Json(profile))
}

/// `GET /api/doctors` — active doctors for the patient-facing directory.
pub async fn doctors(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<AuthedUser>,
) -> Result<Json<Vec<DoctorListing>>, ApiError> {
    let conn = ctx.state.open_db()?;
    Ok(Json(dashboard::doctor_directory(&conn)?))
}
