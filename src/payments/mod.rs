//! Hosted-checkout payment flow.
//!
//! Checkout opens a provider session and records a pending order carrying
//! the session id. The provider redirects back with that id as a query
//! parameter; only a provider-confirmed verification settles the order.
//! Settlement is a conditional update, so replayed confirmations and the
//! cancel route cannot touch a settled row.

pub mod client;

pub use client::*;

use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::db::repository as repo;
use crate::db::DatabaseError;
use crate::models::enums::OrderStatus;
use crate::models::Order;
use crate::policy::{authorize, Action, Actor};
use crate::realtime::{ChangeEvent, ChangeHub, Resource};

const DEFAULT_CURRENCY: &str = "usd";

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Item name is required")]
    MissingItemName,

    #[error("Payment amount must be greater than zero")]
    InvalidAmount,

    #[error("Account profile not found")]
    ProfileNotFound,

    #[error("No order matches this payment session")]
    OrderNotFound,

    #[error("Payment is not completed for this session")]
    NotVerified,

    #[error("Payment session {0} is not known to the provider")]
    SessionUnknown(String),

    #[error("You are not allowed to do that")]
    Forbidden,

    #[error("The payment service is taking too long to respond ({0}s timeout). Please try again later.")]
    Timeout(u64),

    #[error("Payment provider authentication failed. Please check your API key configuration.")]
    AuthFailed,

    #[error("Payment service is unreachable at {0}")]
    Unreachable(String),

    #[error("Payment provider returned error (status {status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Malformed payment provider response: {0}")]
    MalformedReply(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Client-supplied checkout parameters. The return URLs point back into
/// the frontend; the provider appends the session id on redirect.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CheckoutInput {
    pub amount_cents: i64,
    pub item_name: String,
    #[serde(default)]
    pub item_description: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

/// A freshly opened checkout: the pending order and where to send the
/// patient's browser.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckoutStarted {
    pub order: Order,
    pub checkout_url: String,
}

/// Open a provider checkout session and record the pending order.
///
/// The provider call comes first; if it fails no order row exists at all.
pub fn start_checkout(
    conn: &Connection,
    pay: &dyn PaymentClient,
    hub: &ChangeHub,
    actor: &Actor,
    input: &CheckoutInput,
) -> Result<CheckoutStarted, PaymentError> {
    let action = Action::PlaceOrder {
        patient_id: actor.id,
    };
    if !authorize(actor, &action).allowed {
        return Err(PaymentError::Forbidden);
    }
    if input.amount_cents <= 0 {
        return Err(PaymentError::InvalidAmount);
    }
    let item_name = input.item_name.trim();
    if item_name.is_empty() {
        return Err(PaymentError::MissingItemName);
    }

    let profile = repo::get_profile(conn, &actor.id)?.ok_or(PaymentError::ProfileNotFound)?;

    let order_id = Uuid::new_v4();
    let session = pay.create_checkout(&CheckoutRequest {
        amount_cents: input.amount_cents,
        currency: DEFAULT_CURRENCY.to_string(),
        customer_email: profile.email.clone(),
        client_reference: order_id.to_string(),
        item_name: item_name.to_string(),
        item_description: input.item_description.clone(),
        success_url: input.success_url.clone(),
        cancel_url: input.cancel_url.clone(),
    })?;

    let order = Order {
        id: order_id,
        patient_id: actor.id,
        item_name: item_name.to_string(),
        item_description: input.item_description.clone(),
        amount_cents: input.amount_cents,
        currency: DEFAULT_CURRENCY.to_string(),
        status: OrderStatus::Pending,
        session_id: Some(session.id),
        created_at: repo::now_utc(),
        paid_at: None,
    };
    repo::insert_order(conn, &order)?;

    hub.publish(&ChangeEvent::insert(
        Resource::Orders,
        order.id,
        serde_json::to_value(&order).unwrap_or_default(),
    ));
    tracing::info!(order_id = %order.id, amount_cents = order.amount_cents, "checkout opened");

    Ok(CheckoutStarted {
        checkout_url: session.url,
        order,
    })
}

/// Settle an order after the return redirect. The purchase is granted only
/// when the provider confirms the session as paid; anything else leaves
/// the order exactly as it was.
pub fn confirm_payment(
    conn: &Connection,
    pay: &dyn PaymentClient,
    hub: &ChangeHub,
    actor: &Actor,
    session_id: &str,
) -> Result<Order, PaymentError> {
    let order =
        repo::get_order_by_session(conn, session_id)?.ok_or(PaymentError::OrderNotFound)?;
    let action = Action::PlaceOrder {
        patient_id: order.patient_id,
    };
    if !authorize(actor, &action).allowed {
        return Err(PaymentError::Forbidden);
    }

    let verification = pay.verify_session(session_id)?;
    if !verification.verified {
        return Err(PaymentError::NotVerified);
    }

    let affected = repo::mark_order_paid(conn, session_id, repo::now_utc())?;
    let order =
        repo::get_order_by_session(conn, session_id)?.ok_or(PaymentError::OrderNotFound)?;

    if affected > 0 {
        hub.publish(&ChangeEvent::update(
            Resource::Orders,
            order.id,
            serde_json::to_value(&order).unwrap_or_default(),
        ));
        tracing::info!(order_id = %order.id, "order settled");
    }
    Ok(order)
}

/// The cancel return route. Voids a pending order; settled orders are left
/// untouched.
pub fn cancel_checkout(
    conn: &Connection,
    hub: &ChangeHub,
    actor: &Actor,
    session_id: &str,
) -> Result<Order, PaymentError> {
    let order =
        repo::get_order_by_session(conn, session_id)?.ok_or(PaymentError::OrderNotFound)?;
    let action = Action::PlaceOrder {
        patient_id: order.patient_id,
    };
    if !authorize(actor, &action).allowed {
        return Err(PaymentError::Forbidden);
    }

    let affected = repo::cancel_order(conn, session_id)?;
    let order =
        repo::get_order_by_session(conn, session_id)?.ok_or(PaymentError::OrderNotFound)?;

    if affected > 0 {
        hub.publish(&ChangeEvent::update(
            Resource::Orders,
            order.id,
            serde_json::to_value(&order).unwrap_or_default(),
        ));
        tracing::info!(order_id = %order.id, "checkout cancelled");
    }
    Ok(order)
}

/// A patient's orders, newest first. Admins may look at any patient's.
pub fn order_history(
    conn: &Connection,
    actor: &Actor,
    patient_id: &Uuid,
) -> Result<Vec<Order>, PaymentError> {
    let action = Action::ViewOrders {
        patient_id: *patient_id,
    };
    if !authorize(actor, &action).allowed {
        return Err(PaymentError::Forbidden);
    }
    Ok(repo::list_orders_for_patient(conn, patient_id)?)
}
