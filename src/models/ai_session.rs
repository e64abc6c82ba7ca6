use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AiRole, ConversationKind, SeverityTier, TriageSeverity};

/// One turn of an AI triage transcript, stored as JSON inside the session row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiMessage {
    pub role: AiRole,
    pub content: String,
    pub timestamp: NaiveDateTime,
}

/// The structured result of a triage run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageAssessment {
    pub diagnosis: String,
    pub recommendation: String,
    pub severity: TriageSeverity,
    pub requires_doctor: bool,
    pub confidence: i64,
    pub additional_notes: String,
}

/// A saved triage or health-chat session: the transcript plus the final
/// assessment, ratable by the patient afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConversation {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub conversation_type: ConversationKind,
    pub title: String,
    pub messages: Vec<AiMessage>,
    pub assessment: Option<TriageAssessment>,
    pub input_tier: Option<SeverityTier>,
    pub rating: Option<i64>,
    pub rating_comment: Option<String>,
    pub created_at: NaiveDateTime,
}
