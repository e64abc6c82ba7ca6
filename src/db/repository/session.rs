use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::UserRole;

use super::{fmt_ts, parse_ts};

/// What the auth middleware learns about a presented token in one query.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub user_id: Uuid,
    pub role: UserRole,
    pub full_name: String,
    pub email: String,
    pub is_active: bool,
    pub expires_at: NaiveDateTime,
}

pub fn insert_session(
    conn: &Connection,
    token_hash: &str,
    user_id: &Uuid,
    created_at: NaiveDateTime,
    expires_at: NaiveDateTime,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO sessions (token_hash, user_id, created_at, expires_at, last_used_at)
         VALUES (?1, ?2, ?3, ?4, ?3)",
        params![
            token_hash,
            user_id.to_string(),
            fmt_ts(created_at),
            fmt_ts(expires_at),
        ],
    )?;
    Ok(())
}

/// Resolve a token hash to its user, filtering out expired sessions. The
/// suspension flag rides along so the middleware can reject without a second
/// lookup.
pub fn get_session_user(
    conn: &Connection,
    token_hash: &str,
    now: NaiveDateTime,
) -> Result<Option<SessionUser>, DatabaseError> {
    let result = conn.query_row(
        "SELECT s.user_id, s.expires_at, p.role, p.full_name, p.email, p.is_active
         FROM sessions s
         JOIN profiles p ON p.id = s.user_id
         WHERE s.token_hash = ?1 AND s.expires_at > ?2",
        params![token_hash, fmt_ts(now)],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, bool>(5)?,
            ))
        },
    );

    match result {
        Ok((user_id, expires_at, role, full_name, email, is_active)) => Ok(Some(SessionUser {
            user_id: Uuid::parse_str(&user_id)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            role: UserRole::from_str(&role)?,
            full_name,
            email,
            is_active,
            expires_at: parse_ts(&expires_at),
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn touch_session(
    conn: &Connection,
    token_hash: &str,
    now: NaiveDateTime,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE sessions SET last_used_at = ?2 WHERE token_hash = ?1",
        params![token_hash, fmt_ts(now)],
    )?;
    Ok(())
}

pub fn delete_session(conn: &Connection, token_hash: &str) -> Result<usize, DatabaseError> {
    let affected = conn.execute(
        "DELETE FROM sessions WHERE token_hash = ?1",
        params![token_hash],
    )?;
    Ok(affected)
}

/// Drop every session a user holds. Used when an admin suspends the account,
/// so existing tokens die with it.
pub fn delete_sessions_for_user(conn: &Connection, user_id: &Uuid) -> Result<usize, DatabaseError> {
    let affected = conn.execute(
        "DELETE FROM sessions WHERE user_id = ?1",
        params![user_id.to_string()],
    )?;
    Ok(affected)
}

pub fn purge_expired_sessions(
    conn: &Connection,
    now: NaiveDateTime,
) -> Result<usize, DatabaseError> {
    let affected = conn.execute(
        "DELETE FROM sessions WHERE expires_at <= ?1",
        params![fmt_ts(now)],
    )?;
    Ok(affected)
}
