//! Medication catalog endpoints.
//!
//! Two surfaces over one table: the storefront (`/api/store/...`) lists
//! only rows marked available and in stock, the admin surface
//! (`/api/admin/medications...`) sees and edits everything.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::Serialize;
use uuid::Uuid;

use crate::admin;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthedUser};
use crate::db::repository as repo;
use crate::models::{Medication, MedicationInput, MedicationSearch, CATEGORIES, DOSAGE_FORMS};

/// `GET /api/store/medications` — searchable storefront catalog.
pub async fn store_list(
    State(ctx): State<ApiContext>,
    Extension(_user): Extension<AuthedUser>,
    Query(search): Query<MedicationSearch>,
) -> Result<Json<Vec<Medication>>, ApiError> {
    let conn = ctx.state.open_db()?;
    let list = repo::search_medications(
        &conn,
        search.query.as_deref(),
        search.category.as_deref(),
        true,
    )?;
    Ok(Json(list))
}

#[derive(Serialize)]
pub struct StoreMetadata {
    pub categories: Vec<&'static str>,
    pub dosage_forms: Vec<&'static str>,
}

/// `GET /api/store/metadata` — the fixed category and dosage-form lists
/// the storefront filters and admin forms render.
pub async fn metadata(
    Extension(_user): Extension<AuthedUser>,
) -> Result<Json<StoreMetadata>, ApiError> {
    Ok(Json(StoreMetadata {
        categories: CATEGORIES.to_vec(),
        dosage_forms: DOSAGE_FORMS.to_vec(),
    }))
}

/// `GET /api/admin/medications` — the whole catalog, hidden rows included.
pub async fn admin_list(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
) -> Result<Json<Vec<Medication>>, ApiError> {
    let conn = ctx.state.open_db()?;
    let list = admin::full_catalog(&conn, &user.actor())?;
    Ok(Json(list))
}

/// `POST /api/admin/medications` — add a medication.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
    Json(input): Json<MedicationInput>,
) -> Result<Json<Medication>, ApiError> {
    let conn = ctx.state.open_db()?;
    let med = admin::add_medication(&conn, &ctx.state.hub, &user.actor(), &input)?;
    Ok(Json(med))
}

/// `PUT /api/admin/medications/:id` — overwrite a medication.
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<MedicationInput>,
) -> Result<Json<Medication>, ApiError> {
    let conn = ctx.state.open_db()?;
    let med = admin::edit_medication(&conn, &ctx.state.hub, &user.actor(), &id, &input)?;
    Ok(Json(med))
}

#[derive(Serialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}

/// `DELETE /api/admin/medications/:id` — drop a medication. Deleting an id
/// that is already gone still returns 200.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let conn = ctx.state.open_db()?;
    let deleted = admin::remove_medication(&conn, &ctx.state.hub, &user.actor(), &id)?;
    Ok(Json(DeletedResponse { deleted }))
}
