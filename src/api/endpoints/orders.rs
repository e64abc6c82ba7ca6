//! Checkout and order endpoints.
//!
//! Checkout and verification talk to the payment provider over a blocking
//! client, so both run through `run_blocking`. Cancel and history are pure
//! database work.

use axum::extract::State;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::endpoints::run_blocking;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthedUser};
use crate::models::Order;
use crate::payments::{self, CheckoutInput, CheckoutStarted};

/// `POST /api/orders/checkout` — open a provider session and record the
/// pending order.
pub async fn checkout(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
    Json(input): Json<CheckoutInput>,
) -> Result<Json<CheckoutStarted>, ApiError> {
    let state = ctx.state.clone();
    let actor = user.actor();
    let started = run_blocking(move || {
        let conn = state.open_db()?;
        Ok(payments::start_checkout(
            &conn,
            state.payments.as_ref(),
            &state.hub,
            &actor,
            &input,
        )?)
    })
    .await?;
    Ok(Json(started))
}

#[derive(Deserialize)]
pub struct SessionRef {
    pub session_id: String,
}

/// `POST /api/orders/verify` — settle an order after the success redirect.
/// The provider has the final word; an unpaid session leaves the order
/// pending and returns 402.
pub async fn verify(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
    Json(req): Json<SessionRef>,
) -> Result<Json<Order>, ApiError> {
    let state = ctx.state.clone();
    let actor = user.actor();
    let order = run_blocking(move || {
        let conn = state.open_db()?;
        Ok(payments::confirm_payment(
            &conn,
            state.payments.as_ref(),
            &state.hub,
            &actor,
            &req.session_id,
        )?)
    })
    .await?;
    Ok(Json(order))
}

/// `POST /api/orders/cancel` — the cancel redirect. Voids a pending order,
/// leaves settled ones untouched.
pub async fn cancel(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
    Json(req): Json<SessionRef>,
) -> Result<Json<Order>, ApiError> {
    let conn = ctx.state.open_db()?;
    let order = payments::cancel_checkout(
        &conn,
        &ctx.state.hub,
        &user.actor(),
        &req.session_id,
    )?;
    Ok(Json(order))
}

/// `GET /api/orders` — the caller's purchase history, newest first.
pub async fn history(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthedUser>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let conn = ctx.state.open_db()?;
    let list = payments::order_history(&conn, &user.actor(), &user.id)?;
    Ok(Json(list))
}
