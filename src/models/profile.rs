use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::UserRole;

/// A user account. The password hash never rides on this struct; credential
/// lookups go through the repository directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub age: Option<i64>,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub years_of_experience: Option<i64>,
    pub education: Option<String>,
    pub bio: Option<String>,
    pub consultation_fee: Option<f64>,
    pub available_days: Option<String>,
    pub available_hours: Option<String>,
    pub is_active: bool,
    pub suspended_at: Option<NaiveDateTime>,
    pub suspended_by: Option<Uuid>,
    pub suspension_reason: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Directory entry shown to patients picking a doctor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorListing {
    pub id: Uuid,
    pub full_name: String,
    pub specialization: Option<String>,
    pub years_of_experience: Option<i64>,
    pub consultation_fee: Option<f64>,
    pub bio: Option<String>,
    pub available_days: Option<String>,
    pub available_hours: Option<String>,
}

/// Editable subset of a profile. Role and activation state are deliberately
/// absent; those change only through admin operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub age: Option<i64>,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub years_of_experience: Option<i64>,
    pub education: Option<String>,
    pub bio: Option<String>,
    pub consultation_fee: Option<f64>,
    pub available_days: Option<String>,
    pub available_hours: Option<String>,
}
