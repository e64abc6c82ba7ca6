use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::OrderStatus;
use crate::models::Order;

use super::{fmt_ts, parse_ts};

pub fn insert_order(conn: &Connection, order: &Order) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO orders
         (id, patient_id, item_name, item_description, amount_cents, currency,
          status, session_id, created_at, paid_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            order.id.to_string(),
            order.patient_id.to_string(),
            order.item_name,
            order.item_description,
            order.amount_cents,
            order.currency,
            order.status.as_str(),
            order.session_id,
            fmt_ts(order.created_at),
            order.paid_at.map(fmt_ts),
        ],
    )?;
    Ok(())
}

pub fn get_order(conn: &Connection, id: &Uuid) -> Result<Option<Order>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, patient_id, item_name, item_description, amount_cents, currency,
                status, session_id, created_at, paid_at
         FROM orders WHERE id = ?1",
        params![id.to_string()],
        order_row,
    );

    match result {
        Ok(row) => Ok(Some(order_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// The checkout provider hands the session id back in the return URL; it is
/// the only key the success route carries.
pub fn get_order_by_session(
    conn: &Connection,
    session_id: &str,
) -> Result<Option<Order>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, patient_id, item_name, item_description, amount_cents, currency,
                status, session_id, created_at, paid_at
         FROM orders WHERE session_id = ?1",
        params![session_id],
        order_row,
    );

    match result {
        Ok(row) => Ok(Some(order_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_orders_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Order>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, item_name, item_description, amount_cents, currency,
                status, session_id, created_at, paid_at
         FROM orders
         WHERE patient_id = ?1
         ORDER BY created_at DESC",
    )?;

    let rows = stmt.query_map(params![patient_id.to_string()], order_row)?;

    let mut orders = Vec::new();
    for row in rows {
        orders.push(order_from_row(row?)?);
    }
    Ok(orders)
}

/// Settle a pending order after its checkout session verified. Conditional on
/// the pending state, so a replayed success callback cannot re-stamp paid_at.
pub fn mark_order_paid(
    conn: &Connection,
    session_id: &str,
    now: chrono::NaiveDateTime,
) -> Result<usize, DatabaseError> {
    let affected = conn.execute(
        "UPDATE orders SET status = 'paid', paid_at = ?2
         WHERE session_id = ?1 AND status = 'pending'",
        params![session_id, fmt_ts(now)],
    )?;
    Ok(affected)
}

/// The cancellation return route voids the order; already-settled orders are
/// left untouched.
pub fn cancel_order(conn: &Connection, session_id: &str) -> Result<usize, DatabaseError> {
    let affected = conn.execute(
        "UPDATE orders SET status = 'canceled'
         WHERE session_id = ?1 AND status = 'pending'",
        params![session_id],
    )?;
    Ok(affected)
}

pub fn count_orders(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM orders", [], |row| {
        row.get::<_, i64>(0)
    })?;
    Ok(count)
}

pub fn total_paid_revenue_cents(conn: &Connection) -> Result<i64, DatabaseError> {
    let total = conn.query_row(
        "SELECT COALESCE(SUM(amount_cents), 0) FROM orders WHERE status = 'paid'",
        [],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(total)
}

struct OrderRow {
    id: String,
    patient_id: String,
    item_name: String,
    item_description: Option<String>,
    amount_cents: i64,
    currency: String,
    status: String,
    session_id: Option<String>,
    created_at: String,
    paid_at: Option<String>,
}

fn order_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<OrderRow> {
    Ok(OrderRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        item_name: row.get(2)?,
        item_description: row.get(3)?,
        amount_cents: row.get(4)?,
        currency: row.get(5)?,
        status: row.get(6)?,
        session_id: row.get(7)?,
        created_at: row.get(8)?,
        paid_at: row.get(9)?,
    })
}

fn order_from_row(row: OrderRow) -> Result<Order, DatabaseError> {
    Ok(Order {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        patient_id: Uuid::parse_str(&row.patient_id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        item_name: row.item_name,
        item_description: row.item_description,
        amount_cents: row.amount_cents,
        currency: row.currency,
        status: OrderStatus::from_str(&row.status)?,
        session_id: row.session_id,
        created_at: parse_ts(&row.created_at),
        paid_at: row.paid_at.as_deref().map(parse_ts),
    })
}
