//! Case lifecycle endpoints.
//!
//! Patients file, list and cancel their own cases; doctors work the shared
//! queue and drive accepted cases through in_progress to completed. All
//! role and ownership checks live in the case service and its policy calls.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthedUser};
use crate::cases;
use crate::models::{CaseFilter, MedicalCase, NewCase};

/// `POST /api/cases` — file a new consultation request.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
    Json(new): Json<NewCase>,
) -> Result<Json<MedicalCase>, ApiError> {
    let conn = ctx.state.open_db()?;
    let case = cases::file_case(&conn, &ctx.state.hub, &user.actor(), &new)?;
    Ok(Json(case))
}

/// `GET /api/cases/mine` — the signed-in patient's own cases, newest first.
pub async fn mine(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
) -> Result<Json<Vec<MedicalCase>>, ApiError> {
    let conn = ctx.state.open_db()?;
    let list = cases::patient_cases(&conn, &user.actor(), &user.id)?;
    Ok(Json(list))
}

/// `GET /api/cases/queue` — the doctor's work queue, most urgent first.
pub async fn queue(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
    Query(filter): Query<CaseFilter>,
) -> Result<Json<Vec<MedicalCase>>, ApiError> {
    let conn = ctx.state.open_db()?;
    let list = cases::doctor_queue(&conn, &user.actor(), &filter)?;
    Ok(Json(list))
}

/// `POST /api/cases/:id/accept` — conditional accept; exactly one doctor
/// wins a pending case, the loser gets a 409.
pub async fn accept(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<MedicalCase>, ApiError> {
    let conn = ctx.state.open_db()?;
    let case = cases::accept_case(&conn, &ctx.state.hub, &user.actor(), &id)?;
    Ok(Json(case))
}

/// `POST /api/cases/:id/start` — begin treatment on a claimed case.
pub async fn start(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<MedicalCase>, ApiError> {
    let conn = ctx.state.open_db()?;
    let case = cases::start_case(&conn, &ctx.state.hub, &user.actor(), &id)?;
    Ok(Json(case))
}

/// `POST /api/cases/:id/complete` — close out treatment.
pub async fn complete(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<MedicalCase>, ApiError> {
    let conn = ctx.state.open_db()?;
    let case = cases::complete_case(&conn, &ctx.state.hub, &user.actor(), &id)?;
    Ok(Json(case))
}

#[derive(serde::Serialize)]
pub struct HiddenResponse {
    pub ok: bool,
}

/// `POST /api/cases/:id/hide` — soft-delete from the doctor's queue.
pub async fn hide(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<HiddenResponse>, ApiError> {
    let conn = ctx.state.open_db()?;
    cases::hide_case(&conn, &ctx.state.hub, &user.actor(), &id)?;
    Ok(Json(HiddenResponse { ok: true }))
}

/// `POST /api/cases/:id/cancel` — patient cancels a pending/accepted case.
pub async fn cancel(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<MedicalCase>, ApiError> {
    let conn = ctx.state.open_db()?;
    let case = cases::cancel_case(&conn, &ctx.state.hub, &user.actor(), &id)?;
    Ok(Json(case))
}
