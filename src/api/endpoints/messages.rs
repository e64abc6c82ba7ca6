//! Conversation and message endpoints.
//!
//! Threads pair one doctor with one patient. Sending accepts multipart so a
//! text body and a file can travel together; the attachment is checked
//! against the 10 MB ceiling before anything touches the disk.

use axum::body::Bytes;
use axum::extract::{Multipart, Path, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthedUser};
use crate::messaging;
use crate::models::{Conversation, ConversationSummary, Message};

/// `GET /api/conversations` — the caller's threads with unread badges.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
) -> Result<Json<Vec<ConversationSummary>>, ApiError> {
    let conn = ctx.state.open_db()?;
    let list = messaging::inbox(&conn, &user.actor())?;
    Ok(Json(list))
}

#[derive(Deserialize)]
pub struct OpenConversationRequest {
    pub counterpart_id: Uuid,
}

/// `POST /api/conversations` — find or start the thread with a counterpart.
/// Calling twice for the same pair returns the same thread.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
    Json(req): Json<OpenConversationRequest>,
) -> Result<Json<Conversation>, ApiError> {
    let conn = ctx.state.open_db()?;
    let conv =
        messaging::open_conversation(&conn, &ctx.state.hub, &user.actor(), &req.counterpart_id)?;
    Ok(Json(conv))
}

#[derive(Serialize)]
pub struct UnreadResponse {
    pub unread: i64,
}

/// `GET /api/conversations/unread` — total unread across all threads, for
/// the nav badge.
pub async fn unread(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
) -> Result<Json<UnreadResponse>, ApiError> {
    let conn = ctx.state.open_db()?;
    let unread = messaging::unread_total(&conn, &user.actor())?;
    Ok(Json(UnreadResponse { unread }))
}

/// `GET /api/conversations/:id/messages` — full history, oldest first.
pub async fn messages(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let conn = ctx.state.open_db()?;
    let list = messaging::messages(&conn, &user.actor(), &id)?;
    Ok(Json(list))
}

/// `POST /api/conversations/:id/messages` — send a message. Multipart with
/// a `text` part and an optional `file` part; either may be absent but not
/// both.
pub async fn send(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<Message>, ApiError> {
    let mut text = String::new();
    let mut upload: Option<(String, Option<String>, Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(read_failed)? {
        match field.name().map(str::to_string).as_deref() {
            Some("text") => text = field.text().await.map_err(read_failed)?,
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let declared_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(read_failed)?;
                // Browsers submit an empty file part when nothing was picked.
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                upload = Some((file_name, declared_type, bytes));
            }
            _ => continue,
        }
    }

    let conn = ctx.state.open_db()?;
    let actor = user.actor();

    // Membership is checked before the file is written, so an outsider's
    // upload never reaches the disk.
    let conv = messaging::thread(&conn, &actor, &id)?;
    let attachment = match upload {
        Some((file_name, declared_type, bytes)) => {
            let receiver = if conv.doctor_id == user.id {
                conv.patient_id
            } else {
                conv.doctor_id
            };
            Some(ctx.state.attachments.save(
                &user.id,
                &receiver,
                &file_name,
                declared_type.as_deref(),
                &bytes,
            )?)
        }
        None => None,
    };

    let message = messaging::send_message(&conn, &ctx.state.hub, &actor, &id, &text, attachment)?;
    Ok(Json(message))
}

#[derive(Serialize)]
pub struct ReadResponse {
    pub updated: usize,
}

/// `POST /api/conversations/:id/read` — mark the counterpart's messages in
/// this thread as read. Only rows addressed to the caller are touched.
pub async fn read(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReadResponse>, ApiError> {
    let conn = ctx.state.open_db()?;
    let updated = messaging::mark_read(&conn, &ctx.state.hub, &user.actor(), &id)?;
    Ok(Json(ReadResponse { updated }))
}

fn read_failed(err: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::BadRequest("BAD_MULTIPART", format!("Could not read the upload: {err}"))
}
