//! Case lifecycle: filing, the doctor queue, claiming, and transitions.
//!
//! Status moves pending → accepted → in_progress → completed, with
//! cancelled reachable from pending or accepted. Claiming is the only
//! contended step and is settled by a conditional update in the store.

use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::db::repository as repo;
use crate::db::DatabaseError;
use crate::models::enums::CaseStatus;
use crate::models::{CaseFilter, MedicalCase, NewCase};
use crate::policy::{authorize, Action, Actor};
use crate::realtime::{ChangeEvent, ChangeHub, Resource};

#[derive(Debug, Error)]
pub enum CaseError {
    #[error("Case not found")]
    NotFound,

    #[error("You are not allowed to do that with this case")]
    Forbidden,

    #[error("This case has already been accepted by another doctor")]
    AlreadyClaimed,

    #[error("This case can no longer be cancelled")]
    NotCancellable,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// File a new consultation request. The case starts pending and unassigned.
pub fn file_case(
    conn: &Connection,
    hub: &ChangeHub,
    actor: &Actor,
    new: &NewCase,
) -> Result<MedicalCase, CaseError> {
    if !authorize(actor, &Action::FileCase).allowed {
        return Err(CaseError::Forbidden);
    }

    let now = repo::now_utc();
    let case = MedicalCase {
        id: Uuid::new_v4(),
        patient_id: actor.id,
        doctor_id: None,
        case_reason: new.case_reason.trim().to_string(),
        description: new.description.trim().to_string(),
        emergency_level: new.emergency_level,
        status: CaseStatus::Pending,
        hidden_from_doctor: false,
        created_at: now,
        accepted_at: None,
        updated_at: now,
    };
    repo::insert_case(conn, &case)?;

    hub.publish(&ChangeEvent::insert(
        Resource::Cases,
        case.id,
        serde_json::to_value(&case).unwrap_or_default(),
    ));
    tracing::info!(case_id = %case.id, level = case.emergency_level.as_str(), "case filed");
    Ok(case)
}

/// The signed-in doctor's work queue, most urgent first.
pub fn doctor_queue(
    conn: &Connection,
    actor: &Actor,
    filter: &CaseFilter,
) -> Result<Vec<MedicalCase>, CaseError> {
    if !authorize(actor, &Action::ViewQueue).allowed {
        return Err(CaseError::Forbidden);
    }
    Ok(repo::list_queue_for_doctor(conn, &actor.id, filter)?)
}

pub fn patient_cases(
    conn: &Connection,
    actor: &Actor,
    patient_id: &Uuid,
) -> Result<Vec<MedicalCase>, CaseError> {
    let action = Action::ViewPatientCases {
        patient_id: *patient_id,
    };
    if !authorize(actor, &action).allowed {
        return Err(CaseError::Forbidden);
    }
    Ok(repo::list_cases_for_patient(conn, patient_id)?)
}

pub fn all_cases(conn: &Connection, actor: &Actor) -> Result<Vec<MedicalCase>, CaseError> {
    if !authorize(actor, &Action::ViewAllCases).allowed {
        return Err(CaseError::Forbidden);
    }
    Ok(repo::list_all_cases(conn)?)
}

pub fn get_case(
    conn: &Connection,
    actor: &Actor,
    case_id: &Uuid,
) -> Result<MedicalCase, CaseError> {
    let case = repo::get_case(conn, case_id)?.ok_or(CaseError::NotFound)?;
    let action = Action::ViewCase {
        patient_id: case.patient_id,
        doctor_id: case.doctor_id,
    };
    if !authorize(actor, &action).allowed {
        return Err(CaseError::Forbidden);
    }
    Ok(case)
}

/// Claim a pending case. Exactly one of two racing doctors wins; the loser
/// gets [`CaseError::AlreadyClaimed`] and should reload the queue.
pub fn accept_case(
    conn: &Connection,
    hub: &ChangeHub,
    actor: &Actor,
    case_id: &Uuid,
) -> Result<MedicalCase, CaseError> {
    if !authorize(actor, &Action::AcceptCase).allowed {
        return Err(CaseError::Forbidden);
    }
    if repo::get_case(conn, case_id)?.is_none() {
        return Err(CaseError::NotFound);
    }

    let claimed = repo::accept_case(conn, case_id, &actor.id, repo::now_utc())?;
    if claimed == 0 {
        return Err(CaseError::AlreadyClaimed);
    }

    let case = repo::get_case(conn, case_id)?.ok_or(CaseError::NotFound)?;
    publish_update(hub, &case);
    tracing::info!(case_id = %case.id, doctor_id = %actor.id, "case accepted");
    Ok(case)
}

/// Begin treatment on a claimed case.
pub fn start_case(
    conn: &Connection,
    hub: &ChangeHub,
    actor: &Actor,
    case_id: &Uuid,
) -> Result<MedicalCase, CaseError> {
    advance_case(conn, hub, actor, case_id, CaseStatus::InProgress)
}

pub fn complete_case(
    conn: &Connection,
    hub: &ChangeHub,
    actor: &Actor,
    case_id: &Uuid,
) -> Result<MedicalCase, CaseError> {
    advance_case(conn, hub, actor, case_id, CaseStatus::Completed)
}

fn advance_case(
    conn: &Connection,
    hub: &ChangeHub,
    actor: &Actor,
    case_id: &Uuid,
    to: CaseStatus,
) -> Result<MedicalCase, CaseError> {
    let case = repo::get_case(conn, case_id)?.ok_or(CaseError::NotFound)?;
    let action = Action::AdvanceCase {
        doctor_id: case.doctor_id,
    };
    if !authorize(actor, &action).allowed {
        return Err(CaseError::Forbidden);
    }

    // Ownership is the policy's concern; the write itself is unconditional.
    repo::set_case_status(conn, case_id, to, repo::now_utc())?;
    let case = repo::get_case(conn, case_id)?.ok_or(CaseError::NotFound)?;
    publish_update(hub, &case);
    Ok(case)
}

/// Remove a case from the doctor's queue without deleting the row. The case
/// is cancelled and flagged hidden; admins still see it.
pub fn hide_case(
    conn: &Connection,
    hub: &ChangeHub,
    actor: &Actor,
    case_id: &Uuid,
) -> Result<(), CaseError> {
    let case = repo::get_case(conn, case_id)?.ok_or(CaseError::NotFound)?;
    let action = Action::HideCase {
        doctor_id: case.doctor_id,
    };
    if !authorize(actor, &action).allowed {
        return Err(CaseError::Forbidden);
    }

    repo::hide_case(conn, case_id, repo::now_utc())?;
    if let Some(case) = repo::get_case(conn, case_id)? {
        publish_update(hub, &case);
    }
    Ok(())
}

/// Patient-side withdrawal, possible until treatment starts.
pub fn cancel_case(
    conn: &Connection,
    hub: &ChangeHub,
    actor: &Actor,
    case_id: &Uuid,
) -> Result<MedicalCase, CaseError> {
    let case = repo::get_case(conn, case_id)?.ok_or(CaseError::NotFound)?;
    let action = Action::CancelCase {
        patient_id: case.patient_id,
    };
    if !authorize(actor, &action).allowed {
        return Err(CaseError::Forbidden);
    }

    let affected = repo::cancel_case_by_patient(conn, case_id, &actor.id, repo::now_utc())?;
    if affected == 0 {
        return Err(CaseError::NotCancellable);
    }

    let case = repo::get_case(conn, case_id)?.ok_or(CaseError::NotFound)?;
    publish_update(hub, &case);
    Ok(case)
}

fn publish_update(hub: &ChangeHub, case: &MedicalCase) {
    hub.publish(&ChangeEvent::update(
        Resource::Cases,
        case.id,
        serde_json::to_value(case).unwrap_or_default(),
    ));
}
