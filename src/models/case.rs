use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{CaseStatus, EmergencyLevel};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalCase {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub case_reason: String,
    pub description: String,
    pub emergency_level: EmergencyLevel,
    pub status: CaseStatus,
    pub hidden_from_doctor: bool,
    pub created_at: NaiveDateTime,
    pub accepted_at: Option<NaiveDateTime>,
    pub updated_at: NaiveDateTime,
}

/// Input for a newly submitted case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCase {
    pub case_reason: String,
    #[serde(default)]
    pub description: String,
    pub emergency_level: EmergencyLevel,
}

/// Optional queue filters (the status / emergency dropdowns).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaseFilter {
    pub status: Option<CaseStatus>,
    pub emergency_level: Option<EmergencyLevel>,
}
