//! AI triage and health-advice endpoints.
//!
//! The completion client blocks on the wire, so every handler that talks to
//! the model runs through `run_blocking`. Session reads stay on the async
//! side; they only touch SQLite.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::endpoints::run_blocking;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthedUser};
use crate::models::enums::SeverityTier;
use crate::models::AiConversation;
use crate::triage;

#[derive(Deserialize)]
pub struct AnalyzeRequest {
    pub symptoms: String,
    pub severity: SeverityTier,
}

/// `POST /api/triage/analyze` — run a symptom analysis and log the session.
pub async fn analyze(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AiConversation>, ApiError> {
    let state = ctx.state.clone();
    let actor = user.actor();
    let session = run_blocking(move || {
        let conn = state.open_db()?;
        Ok(triage::run_triage(
            &conn,
            state.ai.as_ref(),
            &actor,
            &req.symptoms,
            req.severity,
        )?)
    })
    .await?;
    Ok(Json(session))
}

#[derive(Deserialize)]
pub struct AdviceRequest {
    pub question: String,
}

#[derive(Serialize)]
pub struct AdviceResponse {
    pub reply: String,
}

/// `POST /api/triage/advice` — free-form health question. Model failures
/// degrade to a canned reply, so this only errors on bad input.
pub async fn advice(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
    Json(req): Json<AdviceRequest>,
) -> Result<Json<AdviceResponse>, ApiError> {
    let state = ctx.state.clone();
    let actor = user.actor();
    let reply = run_blocking(move || {
        let conn = state.open_db()?;
        Ok(triage::health_advice(
            &conn,
            state.ai.as_ref(),
            &actor,
            &req.question,
        )?)
    })
    .await?;
    Ok(Json(AdviceResponse { reply }))
}

/// `GET /api/triage/sessions` — the caller's saved sessions, newest first.
pub async fn sessions(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
) -> Result<Json<Vec<AiConversation>>, ApiError> {
    let conn = ctx.state.open_db()?;
    let list = triage::session_history(&conn, &user.actor())?;
    Ok(Json(list))
}

/// `GET /api/triage/sessions/:id` — one session with its full transcript.
pub async fn session(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<AiConversation>, ApiError> {
    let conn = ctx.state.open_db()?;
    let session = triage::get_session(&conn, &user.actor(), &id)?;
    Ok(Json(session))
}

#[derive(Deserialize)]
pub struct RateRequest {
    pub rating: i64,
    pub comment: Option<String>,
}

#[derive(Serialize)]
pub struct RatedResponse {
    pub ok: bool,
}

/// `POST /api/triage/sessions/:id/rating` — rate a session 1 to 5.
pub async fn rate(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<RateRequest>,
) -> Result<Json<RatedResponse>, ApiError> {
    let conn = ctx.state.open_db()?;
    triage::rate_session(
        &conn,
        &user.actor(),
        &id,
        req.rating,
        req.comment.as_deref(),
    )?;
    Ok(Json(RatedResponse { ok: true }))
}
