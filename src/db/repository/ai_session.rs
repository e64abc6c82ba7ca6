use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::{ConversationKind, SeverityTier, TriageSeverity};
use crate::models::{AiConversation, AiMessage, TriageAssessment};

use super::{fmt_ts, parse_ts};

pub fn insert_ai_session(conn: &Connection, session: &AiConversation) -> Result<(), DatabaseError> {
    let messages_json =
        serde_json::to_string(&session.messages).unwrap_or_else(|_| "[]".to_string());

    let (diagnosis, recommendation, severity, requires_doctor, confidence, notes) =
        match &session.assessment {
            Some(a) => (
                Some(a.diagnosis.as_str()),
                Some(a.recommendation.as_str()),
                Some(a.severity.as_str()),
                Some(a.requires_doctor),
                Some(a.confidence),
                Some(a.additional_notes.as_str()),
            ),
            None => (None, None, None, None, None, None),
        };

    conn.execute(
        "INSERT INTO ai_conversations
         (id, patient_id, conversation_type, title, messages, diagnosis,
          recommendation, severity, requires_doctor, confidence, additional_notes,
          input_tier, rating, rating_comment, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            session.id.to_string(),
            session.patient_id.to_string(),
            session.conversation_type.as_str(),
            session.title,
            messages_json,
            diagnosis,
            recommendation,
            severity,
            requires_doctor,
            confidence,
            notes,
            session.input_tier.map(|t| t.as_str()),
            session.rating,
            session.rating_comment,
            fmt_ts(session.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_ai_session(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<AiConversation>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, patient_id, conversation_type, title, messages, diagnosis,
                recommendation, severity, requires_doctor, confidence, additional_notes,
                input_tier, rating, rating_comment, created_at
         FROM ai_conversations WHERE id = ?1",
        params![id.to_string()],
        ai_session_row,
    );

    match result {
        Ok(row) => Ok(Some(ai_session_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_ai_sessions_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<AiConversation>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, conversation_type, title, messages, diagnosis,
                recommendation, severity, requires_doctor, confidence, additional_notes,
                input_tier, rating, rating_comment, created_at
         FROM ai_conversations
         WHERE patient_id = ?1
         ORDER BY created_at DESC",
    )?;

    let rows = stmt.query_map(params![patient_id.to_string()], ai_session_row)?;

    let mut sessions = Vec::new();
    for row in rows {
        sessions.push(ai_session_from_row(row?)?);
    }
    Ok(sessions)
}

/// Patient feedback on a finished session. The ownership guard keeps one
/// patient from rating another's session.
pub fn rate_ai_session(
    conn: &Connection,
    id: &Uuid,
    patient_id: &Uuid,
    rating: i64,
    comment: Option<&str>,
) -> Result<usize, DatabaseError> {
    let affected = conn.execute(
        "UPDATE ai_conversations SET rating = ?3, rating_comment = ?4
         WHERE id = ?1 AND patient_id = ?2",
        params![id.to_string(), patient_id.to_string(), rating, comment],
    )?;
    Ok(affected)
}

pub fn count_ai_sessions(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM ai_conversations", [], |row| {
        row.get::<_, i64>(0)
    })?;
    Ok(count)
}

struct AiSessionRow {
    id: String,
    patient_id: String,
    conversation_type: String,
    title: String,
    messages: String,
    diagnosis: Option<String>,
    recommendation: Option<String>,
    severity: Option<String>,
    requires_doctor: Option<bool>,
    confidence: Option<i64>,
    additional_notes: Option<String>,
    input_tier: Option<String>,
    rating: Option<i64>,
    rating_comment: Option<String>,
    created_at: String,
}

fn ai_session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AiSessionRow> {
    Ok(AiSessionRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        conversation_type: row.get(2)?,
        title: row.get(3)?,
        messages: row.get(4)?,
        diagnosis: row.get(5)?,
        recommendation: row.get(6)?,
        severity: row.get(7)?,
        requires_doctor: row.get(8)?,
        confidence: row.get(9)?,
        additional_notes: row.get(10)?,
        input_tier: row.get(11)?,
        rating: row.get(12)?,
        rating_comment: row.get(13)?,
        created_at: row.get(14)?,
    })
}

fn ai_session_from_row(row: AiSessionRow) -> Result<AiConversation, DatabaseError> {
    let messages: Vec<AiMessage> = serde_json::from_str(&row.messages).unwrap_or_default();

    // The assessment columns are written together; diagnosis + severity
    // present means the whole block is.
    let assessment = match (row.diagnosis, row.severity) {
        (Some(diagnosis), Some(severity)) => Some(TriageAssessment {
            diagnosis,
            recommendation: row.recommendation.unwrap_or_default(),
            severity: TriageSeverity::from_str(&severity)?,
            requires_doctor: row.requires_doctor.unwrap_or(false),
            confidence: row.confidence.unwrap_or(0),
            additional_notes: row.additional_notes.unwrap_or_default(),
        }),
        _ => None,
    };

    Ok(AiConversation {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        patient_id: Uuid::parse_str(&row.patient_id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        conversation_type: ConversationKind::from_str(&row.conversation_type)?,
        title: row.title,
        messages,
        assessment,
        input_tier: row
            .input_tier
            .as_deref()
            .map(SeverityTier::from_str)
            .transpose()?,
        rating: row.rating,
        rating_comment: row.rating_comment,
        created_at: parse_ts(&row.created_at),
    })
}
