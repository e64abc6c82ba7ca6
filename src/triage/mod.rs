//! AI symptom triage: prompt construction, the completion client, reply
//! parsing, and the saved session log.
//!
//! The completion call is synchronous (blocking HTTP with an explicit
//! timeout); async callers run it on a blocking worker. AI failures are
//! typed before they leave this module, so the surface can tell "the
//! service is down" from "the key is wrong" without sniffing strings.

pub mod client;
pub mod parser;
pub mod prompt;

pub use client::*;
pub use parser::*;
pub use prompt::*;

use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::db::repository as repo;
use crate::db::DatabaseError;
use crate::models::enums::{AiRole, ConversationKind, SeverityTier};
use crate::models::{AiConversation, AiMessage};
use crate::policy::{authorize, Action, Actor};

#[derive(Debug, Error)]
pub enum TriageError {
    #[error("Symptoms description is required")]
    MissingSymptoms,

    #[error("Question is required")]
    MissingQuestion,

    #[error("Rating must be between 1 and 5")]
    InvalidRating,

    #[error("Session not found")]
    SessionNotFound,

    #[error("You are not allowed to do that")]
    Forbidden,

    #[error("The AI service is taking too long to respond ({0}s timeout). Please try again later.")]
    Timeout(u64),

    #[error("AI model currently unavailable. Please try again later.")]
    ModelUnavailable,

    #[error("API authentication failed. Please check your API key configuration.")]
    AuthFailed,

    #[error("AI service is unreachable at {0}")]
    Unreachable(String),

    #[error("AI service returned error (status {status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Malformed completion response: {0}")]
    MalformedReply(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Canned reply used when the advice call fails. The patient sees guidance
/// in the assistant's voice rather than a transport error.
pub const ADVICE_UNAVAILABLE: &str = "I apologise, but I'm unable to provide health advice \
     at the moment. Please consult with a healthcare provider for proper medical guidance.";

/// Run a symptom analysis for the signed-in patient and log the session.
///
/// A reply the parser cannot use still produces an assessment (excerpt
/// plus conservative defaults), so an error out of here is validation,
/// the AI transport, or the session insert.
pub fn run_triage(
    conn: &Connection,
    ai: &dyn CompletionClient,
    actor: &Actor,
    symptoms: &str,
    severity: SeverityTier,
) -> Result<AiConversation, TriageError> {
    let action = Action::RunTriage {
        patient_id: actor.id,
    };
    if !authorize(actor, &action).allowed {
        return Err(TriageError::Forbidden);
    }
    let symptoms = symptoms.trim();
    if symptoms.is_empty() {
        return Err(TriageError::MissingSymptoms);
    }

    let request = CompletionRequest {
        messages: vec![ChatMessage::user(build_triage_prompt(symptoms, severity))],
        temperature: TRIAGE_TEMPERATURE,
        max_tokens: TRIAGE_MAX_TOKENS,
    };
    let reply = ai.complete(&request)?;
    let assessment = parse_assessment(&reply, severity);
    tracing::info!(
        severity = assessment.severity.as_str(),
        requires_doctor = assessment.requires_doctor,
        confidence = assessment.confidence,
        "triage assessment parsed"
    );

    let transcript = format!(
        "Patient: {symptoms}\nAssistant: {}",
        assessment.recommendation
    );
    let title = generate_title(ai, &transcript);

    let now = repo::now_utc();
    let session = AiConversation {
        id: Uuid::new_v4(),
        patient_id: actor.id,
        conversation_type: ConversationKind::SymptomCheck,
        title,
        messages: vec![
            AiMessage {
                role: AiRole::User,
                content: symptoms.to_string(),
                timestamp: now,
            },
            AiMessage {
                role: AiRole::Assistant,
                content: assessment.recommendation.clone(),
                timestamp: now,
            },
        ],
        assessment: Some(assessment),
        input_tier: Some(severity),
        rating: None,
        rating_comment: None,
        created_at: now,
    };
    repo::insert_ai_session(conn, &session)?;

    Ok(session)
}

/// Answer a free-form health question. Successful answers are logged as a
/// chat session; an AI failure degrades to a canned reply and logs nothing.
pub fn health_advice(
    conn: &Connection,
    ai: &dyn CompletionClient,
    actor: &Actor,
    question: &str,
) -> Result<String, TriageError> {
    let action = Action::RunTriage {
        patient_id: actor.id,
    };
    if !authorize(actor, &action).allowed {
        return Err(TriageError::Forbidden);
    }
    let question = question.trim();
    if question.is_empty() {
        return Err(TriageError::MissingQuestion);
    }

    let request = CompletionRequest {
        messages: vec![ChatMessage::user(build_advice_prompt(question))],
        temperature: ADVICE_TEMPERATURE,
        max_tokens: ADVICE_MAX_TOKENS,
    };
    let reply = match ai.complete(&request) {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(error = %e, "health advice request failed, returning fallback");
            return Ok(ADVICE_UNAVAILABLE.to_string());
        }
    };

    let title = generate_title(ai, &format!("Patient: {question}\nAssistant: {reply}"));
    let now = repo::now_utc();
    let session = AiConversation {
        id: Uuid::new_v4(),
        patient_id: actor.id,
        conversation_type: ConversationKind::HealthChat,
        title,
        messages: vec![
            AiMessage {
                role: AiRole::User,
                content: question.to_string(),
                timestamp: now,
            },
            AiMessage {
                role: AiRole::Assistant,
                content: reply.clone(),
                timestamp: now,
            },
        ],
        assessment: None,
        input_tier: None,
        rating: None,
        rating_comment: None,
        created_at: now,
    };
    repo::insert_ai_session(conn, &session)?;

    Ok(reply)
}

/// The signed-in patient's saved sessions, newest first.
pub fn session_history(
    conn: &Connection,
    actor: &Actor,
) -> Result<Vec<AiConversation>, TriageError> {
    let action = Action::ViewAiSessions {
        patient_id: actor.id,
    };
    if !authorize(actor, &action).allowed {
        return Err(TriageError::Forbidden);
    }
    Ok(repo::list_ai_sessions_for_patient(conn, &actor.id)?)
}

pub fn get_session(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
) -> Result<AiConversation, TriageError> {
    let session = repo::get_ai_session(conn, id)?.ok_or(TriageError::SessionNotFound)?;
    let action = Action::ViewAiSessions {
        patient_id: session.patient_id,
    };
    if !authorize(actor, &action).allowed {
        return Err(TriageError::Forbidden);
    }
    Ok(session)
}

/// Rate a finished session 1 to 5 with an optional comment. The ownership
/// guard lives in the update itself; a miss reads as "no such session".
pub fn rate_session(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
    rating: i64,
    comment: Option<&str>,
) -> Result<(), TriageError> {
    if !(1..=5).contains(&rating) {
        return Err(TriageError::InvalidRating);
    }
    let affected = repo::rate_ai_session(conn, id, &actor.id, rating, comment)?;
    if affected == 0 {
        return Err(TriageError::SessionNotFound);
    }
    Ok(())
}

/// Ask the model for a short session title. Titles are cosmetic; any
/// failure falls back to the generic one rather than failing the run.
fn generate_title(ai: &dyn CompletionClient, conversation_text: &str) -> String {
    let request = CompletionRequest {
        messages: vec![ChatMessage::user(build_title_prompt(conversation_text))],
        temperature: TITLE_TEMPERATURE,
        max_tokens: TITLE_MAX_TOKENS,
    };
    match ai.complete(&request) {
        Ok(reply) => clean_title(&reply),
        Err(e) => {
            tracing::warn!(error = %e, "title generation failed, using fallback");
            DEFAULT_TITLE.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::models::enums::{TriageSeverity, UserRole};
    use rusqlite::params;

    fn seed_actor(conn: &Connection, email: &str, name: &str, role: UserRole) -> Actor {
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO profiles (id, email, password_hash, full_name, role, is_active,
                                   created_at, updated_at)
             VALUES (?1, ?2, 'h', ?3, ?4, 1, '2026-01-01 08:00:00', '2026-01-01 08:00:00')",
            params![id.to_string(), email, name, role.as_str()],
        )
        .unwrap();
        Actor { id, role }
    }

    fn assessment_reply() -> String {
        r#"Here is the assessment:
{
  "diagnosis": "Migraine without aura",
  "recommendation": "Rest in a dark quiet room and stay hydrated",
  "severity": "medium",
  "requiresDoctor": false,
  "confidence": 84,
  "additionalNotes": "Seek care if the pattern changes"
}"#
        .to_string()
    }

    #[test]
    fn analysis_saves_a_full_session() {
        let conn = open_memory_database().unwrap();
        let patient = seed_actor(&conn, "p@x.test", "Alice", UserRole::Patient);
        let ai = MockCompletionClient::scripted(vec![
            Ok(assessment_reply()),
            Ok("\"Recurring Migraine Check\"".to_string()),
        ]);

        let session = run_triage(
            &conn,
            &ai,
            &patient,
            "  throbbing headache with light sensitivity  ",
            SeverityTier::Moderate,
        )
        .unwrap();

        assert_eq!(session.title, "Recurring Migraine Check");
        assert_eq!(session.conversation_type, ConversationKind::SymptomCheck);
        assert_eq!(session.input_tier, Some(SeverityTier::Moderate));
        assert_eq!(session.messages.len(), 2);
        assert_eq!(
            session.messages[0].content,
            "throbbing headache with light sensitivity"
        );

        let assessment = session.assessment.as_ref().unwrap();
        assert_eq!(assessment.diagnosis, "Migraine without aura");
        assert_eq!(assessment.severity, TriageSeverity::Medium);
        assert_eq!(assessment.confidence, 84);

        let loaded = repo::get_ai_session(&conn, &session.id).unwrap().unwrap();
        assert_eq!(loaded.title, session.title);
        assert_eq!(loaded.assessment, session.assessment);
    }

    #[test]
    fn analysis_and_title_use_their_own_sampling() {
        let conn = open_memory_database().unwrap();
        let patient = seed_actor(&conn, "p@x.test", "Alice", UserRole::Patient);
        let ai = MockCompletionClient::scripted(vec![
            Ok(assessment_reply()),
            Ok("Migraine".to_string()),
        ]);

        run_triage(&conn, &ai, &patient, "headache", SeverityTier::Mild).unwrap();

        let seen = ai.requests();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].temperature, TRIAGE_TEMPERATURE);
        assert_eq!(seen[0].max_tokens, TRIAGE_MAX_TOKENS);
        assert!(seen[0].messages[0].content.contains("headache"));
        assert_eq!(seen[1].temperature, TITLE_TEMPERATURE);
        assert_eq!(seen[1].max_tokens, TITLE_MAX_TOKENS);
    }

    #[test]
    fn blank_symptoms_are_rejected_before_any_call() {
        let conn = open_memory_database().unwrap();
        let patient = seed_actor(&conn, "p@x.test", "Alice", UserRole::Patient);
        let ai = MockCompletionClient::replying("unused");

        let result = run_triage(&conn, &ai, &patient, "   ", SeverityTier::Mild);
        assert!(matches!(result, Err(TriageError::MissingSymptoms)));
        assert!(ai.requests().is_empty());
    }

    #[test]
    fn only_patients_run_triage() {
        let conn = open_memory_database().unwrap();
        let doctor = seed_actor(&conn, "d@x.test", "Dr. Chen", UserRole::Doctor);
        let ai = MockCompletionClient::replying("unused");

        let result = run_triage(&conn, &ai, &doctor, "headache", SeverityTier::Mild);
        assert!(matches!(result, Err(TriageError::Forbidden)));
        assert!(ai.requests().is_empty());
    }

    #[test]
    fn ai_failure_is_typed_and_saves_nothing() {
        let conn = open_memory_database().unwrap();
        let patient = seed_actor(&conn, "p@x.test", "Alice", UserRole::Patient);
        let ai = MockCompletionClient::scripted(vec![Err(TriageError::Timeout(60))]);

        let result = run_triage(&conn, &ai, &patient, "headache", SeverityTier::Mild);
        assert!(matches!(result, Err(TriageError::Timeout(60))));
        assert_eq!(repo::count_ai_sessions(&conn).unwrap(), 0);
    }

    #[test]
    fn title_failure_falls_back_without_failing_the_run() {
        let conn = open_memory_database().unwrap();
        let patient = seed_actor(&conn, "p@x.test", "Alice", UserRole::Patient);
        let ai = MockCompletionClient::scripted(vec![
            Ok(assessment_reply()),
            Err(TriageError::ModelUnavailable),
        ]);

        let session = run_triage(&conn, &ai, &patient, "headache", SeverityTier::Mild).unwrap();
        assert_eq!(session.title, DEFAULT_TITLE);
    }

    #[test]
    fn advice_logs_a_chat_session() {
        let conn = open_memory_database().unwrap();
        let patient = seed_actor(&conn, "p@x.test", "Alice", UserRole::Patient);
        let ai = MockCompletionClient::scripted(vec![
            Ok("Aim for about two litres of fluids a day.".to_string()),
            Ok("Daily Hydration Guidance".to_string()),
        ]);

        let reply = health_advice(&conn, &ai, &patient, "How much water should I drink?").unwrap();
        assert_eq!(reply, "Aim for about two litres of fluids a day.");

        let sessions = repo::list_ai_sessions_for_patient(&conn, &patient.id).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].conversation_type, ConversationKind::HealthChat);
        assert_eq!(sessions[0].title, "Daily Hydration Guidance");
        assert!(sessions[0].assessment.is_none());
        assert!(sessions[0].input_tier.is_none());
    }

    #[test]
    fn advice_failure_returns_canned_reply_and_logs_nothing() {
        let conn = open_memory_database().unwrap();
        let patient = seed_actor(&conn, "p@x.test", "Alice", UserRole::Patient);
        let ai = MockCompletionClient::scripted(vec![Err(TriageError::Unreachable(
            "https://api.example.test".to_string(),
        ))]);

        let reply = health_advice(&conn, &ai, &patient, "Is coffee bad for me?").unwrap();
        assert_eq!(reply, ADVICE_UNAVAILABLE);
        assert_eq!(repo::count_ai_sessions(&conn).unwrap(), 0);
    }

    #[test]
    fn history_and_get_are_owner_scoped() {
        let conn = open_memory_database().unwrap();
        let alice = seed_actor(&conn, "a@x.test", "Alice", UserRole::Patient);
        let bob = seed_actor(&conn, "b@x.test", "Bob", UserRole::Patient);
        let ai = MockCompletionClient::scripted(vec![
            Ok(assessment_reply()),
            Ok("Migraine".to_string()),
        ]);
        let session = run_triage(&conn, &ai, &alice, "headache", SeverityTier::Mild).unwrap();

        assert_eq!(session_history(&conn, &alice).unwrap().len(), 1);
        assert!(session_history(&conn, &bob).unwrap().is_empty());

        assert!(get_session(&conn, &alice, &session.id).is_ok());
        assert!(matches!(
            get_session(&conn, &bob, &session.id),
            Err(TriageError::Forbidden)
        ));
        assert!(matches!(
            get_session(&conn, &alice, &Uuid::new_v4()),
            Err(TriageError::SessionNotFound)
        ));
    }

    #[test]
    fn rating_is_bounded_and_owner_only() {
        let conn = open_memory_database().unwrap();
        let alice = seed_actor(&conn, "a@x.test", "Alice", UserRole::Patient);
        let bob = seed_actor(&conn, "b@x.test", "Bob", UserRole::Patient);
        let ai = MockCompletionClient::scripted(vec![
            Ok(assessment_reply()),
            Ok("Migraine".to_string()),
        ]);
        let session = run_triage(&conn, &ai, &alice, "headache", SeverityTier::Mild).unwrap();

        assert!(matches!(
            rate_session(&conn, &alice, &session.id, 0, None),
            Err(TriageError::InvalidRating)
        ));
        assert!(matches!(
            rate_session(&conn, &bob, &session.id, 4, None),
            Err(TriageError::SessionNotFound)
        ));

        rate_session(&conn, &alice, &session.id, 5, Some("clear and helpful")).unwrap();
        let loaded = get_session(&conn, &alice, &session.id).unwrap();
        assert_eq!(loaded.rating, Some(5));
        assert_eq!(loaded.rating_comment.as_deref(), Some("clear and helpful"));
    }
}
