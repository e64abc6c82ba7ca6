use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{Attachment, Conversation, ConversationSummary, Message};

use super::{fmt_ts, parse_ts};

/// Find or create the one thread a doctor/patient pair shares. Concurrent
/// callers race on the UNIQUE(doctor_id, patient_id) constraint; DO NOTHING
/// lets the loser fall through to the read, so both sides end up holding the
/// same row. The second element reports whether this call created the row.
pub fn get_or_create_conversation(
    conn: &Connection,
    doctor_id: &Uuid,
    patient_id: &Uuid,
    now: chrono::NaiveDateTime,
) -> Result<(Conversation, bool), DatabaseError> {
    let created = conn.execute(
        "INSERT INTO conversations (id, doctor_id, patient_id, created_at, last_message_at)
         VALUES (?1, ?2, ?3, ?4, ?4)
         ON CONFLICT(doctor_id, patient_id) DO NOTHING",
        params![
            Uuid::new_v4().to_string(),
            doctor_id.to_string(),
            patient_id.to_string(),
            fmt_ts(now),
        ],
    )? > 0;

    let conv = conn.query_row(
        "SELECT id, doctor_id, patient_id, created_at, last_message_at
         FROM conversations WHERE doctor_id = ?1 AND patient_id = ?2",
        params![doctor_id.to_string(), patient_id.to_string()],
        conversation_row,
    )?;
    Ok((conversation_from_row(conv)?, created))
}

pub fn get_conversation(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<Conversation>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, doctor_id, patient_id, created_at, last_message_at
         FROM conversations WHERE id = ?1",
        params![id.to_string()],
        conversation_row,
    );

    match result {
        Ok(row) => Ok(Some(conversation_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Inbox view: every thread the user belongs to, annotated with the
/// counterpart's display name and how many received messages are still
/// unread. Most recently active thread first.
pub fn list_conversations_for_user(
    conn: &Connection,
    user_id: &Uuid,
) -> Result<Vec<ConversationSummary>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.doctor_id, c.patient_id,
                CASE WHEN c.doctor_id = ?1 THEN p.full_name ELSE d.full_name END,
                c.last_message_at,
                (SELECT COUNT(*) FROM messages m
                 WHERE m.conversation_id = c.id
                   AND m.receiver_id = ?1
                   AND m.is_read = 0)
         FROM conversations c
         JOIN profiles d ON d.id = c.doctor_id
         JOIN profiles p ON p.id = c.patient_id
         WHERE c.doctor_id = ?1 OR c.patient_id = ?1
         ORDER BY c.last_message_at DESC",
    )?;

    let rows = stmt.query_map(params![user_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, i64>(5)?,
        ))
    })?;

    let mut summaries = Vec::new();
    for row in rows {
        let (id, doctor_id, patient_id, counterpart_name, last_message_at, unread_count) = row?;
        summaries.push(ConversationSummary {
            id: parse_uuid(&id)?,
            doctor_id: parse_uuid(&doctor_id)?,
            patient_id: parse_uuid(&patient_id)?,
            counterpart_name,
            last_message_at: parse_ts(&last_message_at),
            unread_count,
        });
    }
    Ok(summaries)
}

pub fn insert_message(conn: &Connection, message: &Message) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO messages
         (id, conversation_id, sender_id, receiver_id, message_text,
          attachment_url, attachment_name, attachment_type, attachment_size,
          is_read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            message.id.to_string(),
            message.conversation_id.to_string(),
            message.sender_id.to_string(),
            message.receiver_id.to_string(),
            message.message_text,
            message.attachment.as_ref().map(|a| a.url.as_str()),
            message.attachment.as_ref().map(|a| a.name.as_str()),
            message.attachment.as_ref().map(|a| a.content_type.as_str()),
            message.attachment.as_ref().map(|a| a.size),
            message.is_read,
            fmt_ts(message.created_at),
        ],
    )?;
    Ok(())
}

/// Advance the conversation's activity cursor; inbox ordering keys off it.
pub fn touch_conversation(
    conn: &Connection,
    conversation_id: &Uuid,
    at: chrono::NaiveDateTime,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE conversations SET last_message_at = ?2 WHERE id = ?1",
        params![conversation_id.to_string(), fmt_ts(at)],
    )?;
    Ok(())
}

pub fn list_messages(
    conn: &Connection,
    conversation_id: &Uuid,
) -> Result<Vec<Message>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, conversation_id, sender_id, receiver_id, message_text,
                attachment_url, attachment_name, attachment_type, attachment_size,
                is_read, created_at
         FROM messages
         WHERE conversation_id = ?1
         ORDER BY created_at ASC",
    )?;

    let rows = stmt.query_map(params![conversation_id.to_string()], message_row)?;

    let mut messages = Vec::new();
    for row in rows {
        messages.push(message_from_row(row?)?);
    }
    Ok(messages)
}

/// Flip unread rows addressed to `reader_id` in one thread. Scoped to the
/// receiver on purpose: a reader can never mark the counterpart's copy, and
/// rows already read are left alone.
pub fn mark_messages_read(
    conn: &Connection,
    conversation_id: &Uuid,
    reader_id: &Uuid,
) -> Result<usize, DatabaseError> {
    let affected = conn.execute(
        "UPDATE messages SET is_read = 1
         WHERE conversation_id = ?1 AND receiver_id = ?2 AND is_read = 0",
        params![conversation_id.to_string(), reader_id.to_string()],
    )?;
    Ok(affected)
}

pub fn total_unread_for_user(conn: &Connection, user_id: &Uuid) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE receiver_id = ?1 AND is_read = 0",
        params![user_id.to_string()],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(count)
}

fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

struct ConversationRow {
    id: String,
    doctor_id: String,
    patient_id: String,
    created_at: String,
    last_message_at: String,
}

fn conversation_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        doctor_id: row.get(1)?,
        patient_id: row.get(2)?,
        created_at: row.get(3)?,
        last_message_at: row.get(4)?,
    })
}

fn conversation_from_row(row: ConversationRow) -> Result<Conversation, DatabaseError> {
    Ok(Conversation {
        id: parse_uuid(&row.id)?,
        doctor_id: parse_uuid(&row.doctor_id)?,
        patient_id: parse_uuid(&row.patient_id)?,
        created_at: parse_ts(&row.created_at),
        last_message_at: parse_ts(&row.last_message_at),
    })
}

struct MessageRow {
    id: String,
    conversation_id: String,
    sender_id: String,
    receiver_id: String,
    message_text: String,
    attachment_url: Option<String>,
    attachment_name: Option<String>,
    attachment_type: Option<String>,
    attachment_size: Option<i64>,
    is_read: bool,
    created_at: String,
}

fn message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        receiver_id: row.get(3)?,
        message_text: row.get(4)?,
        attachment_url: row.get(5)?,
        attachment_name: row.get(6)?,
        attachment_type: row.get(7)?,
        attachment_size: row.get(8)?,
        is_read: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn message_from_row(row: MessageRow) -> Result<Message, DatabaseError> {
    let attachment = row.attachment_url.map(|url| Attachment {
        url,
        name: row.attachment_name.unwrap_or_default(),
        content_type: row.attachment_type.unwrap_or_default(),
        size: row.attachment_size.unwrap_or(0),
    });
    Ok(Message {
        id: parse_uuid(&row.id)?,
        conversation_id: parse_uuid(&row.conversation_id)?,
        sender_id: parse_uuid(&row.sender_id)?,
        receiver_id: parse_uuid(&row.receiver_id)?,
        message_text: row.message_text,
        attachment,
        is_read: row.is_read,
        created_at: parse_ts(&row.created_at),
    })
}
