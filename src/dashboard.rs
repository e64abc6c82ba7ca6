//! Landing-view aggregates and the doctor directory.
//!
//! Doctors get a snapshot of their workload (patients on the platform, own
//! active and completed cases, unread messages). Patients get the directory
//! of active doctors they can be routed to. Both are read paths over the
//! repository count helpers; nothing here mutates state.

use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;

use crate::db::repository as repo;
use crate::db::DatabaseError;
use crate::models::enums::{CaseStatus, UserRole};
use crate::models::DoctorListing;
use crate::policy::{authorize, Action, Actor};

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("You do not have permission to view this dashboard")]
    Forbidden,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Workload snapshot for the doctor's landing view.
#[derive(Debug, Clone, Serialize)]
pub struct DoctorStats {
    pub total_patients: i64,
    pub active_cases: i64,
    pub completed_cases: i64,
    pub unread_messages: i64,
}

/// Counts shown on the doctor dashboard. Active means accepted or in
/// progress and assigned to this doctor.
pub fn doctor_stats(conn: &Connection, actor: &Actor) -> Result<DoctorStats, DashboardError> {
    if !authorize(actor, &Action::ViewQueue).allowed {
        return Err(DashboardError::Forbidden);
    }

    let active = repo::count_cases_for_doctor(conn, &actor.id, Some(CaseStatus::Accepted))?
        + repo::count_cases_for_doctor(conn, &actor.id, Some(CaseStatus::InProgress))?;

    Ok(DoctorStats {
        total_patients: repo::count_profiles_by_role(conn, UserRole::Patient)?,
        active_cases: active,
        completed_cases: repo::count_cases_for_doctor(conn, &actor.id, Some(CaseStatus::Completed))?,
        unread_messages: repo::total_unread_for_user(conn, &actor.id)?,
    })
}

/// Active doctors with their consultation details, for patients choosing
/// who to consult. Open to any signed-in user.
pub fn doctor_directory(conn: &Connection) -> Result<Vec<DoctorListing>, DashboardError> {
    Ok(repo::list_active_doctors(conn)?)
}
