//! Administrative oversight: platform aggregates, account management and
//! the medication catalog.
//!
//! Suspension is a soft lock. The profile row stays (cases, conversations
//! and orders keep their foreign keys) but `is_active` drops to 0, the
//! account's sessions are revoked, and login refuses until an admin
//! reactivates. Who suspended whom, when and why is kept on the row.

use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::db::repository as repo;
use crate::db::DatabaseError;
use crate::models::enums::{CaseStatus, UserRole};
use crate::models::{Medication, MedicationInput, UserProfile};
use crate::policy::{authorize, Action, Actor};
use crate::realtime::{ChangeEvent, ChangeHub, Resource};

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("You are not allowed to do that")]
    Forbidden,

    #[error("User not found")]
    UserNotFound,

    #[error("You cannot suspend your own account")]
    SelfSuspension,

    #[error("Medication not found")]
    MedicationNotFound,

    #[error("Medication name is required")]
    MissingName,

    #[error("Price cannot be negative")]
    NegativePrice,

    #[error("Stock cannot be negative")]
    NegativeStock,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Platform-wide aggregates for the admin overview.
#[derive(Debug, Clone, Serialize)]
pub struct AdminStats {
    pub total_patients: i64,
    pub total_doctors: i64,
    pub total_admins: i64,
    pub total_cases: i64,
    pub pending_cases: i64,
    pub accepted_cases: i64,
    pub in_progress_cases: i64,
    pub completed_cases: i64,
    pub cancelled_cases: i64,
    pub total_medications: i64,
    pub total_orders: i64,
    pub paid_revenue_cents: i64,
    pub ai_sessions: i64,
}

pub fn platform_stats(conn: &Connection, actor: &Actor) -> Result<AdminStats, AdminError> {
    if !authorize(actor, &Action::ManageUsers).allowed {
        return Err(AdminError::Forbidden);
    }

    Ok(AdminStats {
        total_patients: repo::count_profiles_by_role(conn, UserRole::Patient)?,
        total_doctors: repo::count_profiles_by_role(conn, UserRole::Doctor)?,
        total_admins: repo::count_profiles_by_role(conn, UserRole::Admin)?,
        total_cases: repo::count_cases_by_status(conn, None)?,
        pending_cases: repo::count_cases_by_status(conn, Some(CaseStatus::Pending))?,
        accepted_cases: repo::count_cases_by_status(conn, Some(CaseStatus::Accepted))?,
        in_progress_cases: repo::count_cases_by_status(conn, Some(CaseStatus::InProgress))?,
        completed_cases: repo::count_cases_by_status(conn, Some(CaseStatus::Completed))?,
        cancelled_cases: repo::count_cases_by_status(conn, Some(CaseStatus::Cancelled))?,
        total_medications: repo::count_medications(conn)?,
        total_orders: repo::count_orders(conn)?,
        paid_revenue_cents: repo::total_paid_revenue_cents(conn)?,
        ai_sessions: repo::count_ai_sessions(conn)?,
    })
}

/// All accounts, newest first, optionally narrowed to one role.
pub fn list_users(
    conn: &Connection,
    actor: &Actor,
    role: Option<UserRole>,
) -> Result<Vec<UserProfile>, AdminError> {
    if !authorize(actor, &Action::ManageUsers).allowed {
        return Err(AdminError::Forbidden);
    }
    Ok(repo::list_profiles(conn, role)?)
}

/// Lock an account and revoke its sessions. The reason is stored verbatim
/// (trimmed) next to the timestamp and the suspending admin's id.
pub fn suspend_user(
    conn: &Connection,
    actor: &Actor,
    user_id: &Uuid,
    reason: &str,
) -> Result<UserProfile, AdminError> {
    if !authorize(actor, &Action::ManageUsers).allowed {
        return Err(AdminError::Forbidden);
    }
    if *user_id == actor.id {
        return Err(AdminError::SelfSuspension);
    }

    let now = repo::now_utc();
    let affected = repo::suspend_profile(conn, user_id, &actor.id, reason.trim(), now)?;
    if affected == 0 {
        return Err(AdminError::UserNotFound);
    }
    let revoked = repo::delete_sessions_for_user(conn, user_id)?;

    tracing::info!(
        user_id = %user_id,
        suspended_by = %actor.id,
        revoked_sessions = revoked,
        "account suspended"
    );

    repo::get_profile(conn, user_id)?.ok_or(AdminError::UserNotFound)
}

/// Clear a suspension. Already-active accounts come back unchanged.
pub fn activate_user(
    conn: &Connection,
    actor: &Actor,
    user_id: &Uuid,
) -> Result<UserProfile, AdminError> {
    if !authorize(actor, &Action::ManageUsers).allowed {
        return Err(AdminError::Forbidden);
    }

    let affected = repo::activate_profile(conn, user_id, repo::now_utc())?;
    if affected == 0 {
        return Err(AdminError::UserNotFound);
    }

    tracing::info!(user_id = %user_id, activated_by = %actor.id, "account reactivated");

    repo::get_profile(conn, user_id)?.ok_or(AdminError::UserNotFound)
}

/// The whole catalog, rows hidden from the storefront included.
pub fn full_catalog(conn: &Connection, actor: &Actor) -> Result<Vec<Medication>, AdminError> {
    if !authorize(actor, &Action::ManageCatalog).allowed {
        return Err(AdminError::Forbidden);
    }
    Ok(repo::search_medications(conn, None, None, false)?)
}

fn validate_medication(input: &MedicationInput) -> Result<(), AdminError> {
    if input.name.trim().is_empty() {
        return Err(AdminError::MissingName);
    }
    if input.price < 0.0 {
        return Err(AdminError::NegativePrice);
    }
    if input.stock_quantity < 0 {
        return Err(AdminError::NegativeStock);
    }
    Ok(())
}

/// Put a new medication in the catalog.
pub fn add_medication(
    conn: &Connection,
    hub: &ChangeHub,
    actor: &Actor,
    input: &MedicationInput,
) -> Result<Medication, AdminError> {
    if !authorize(actor, &Action::ManageCatalog).allowed {
        return Err(AdminError::Forbidden);
    }
    validate_medication(input)?;

    let med = Medication {
        id: Uuid::new_v4(),
        name: input.name.trim().to_string(),
        description: input.description.clone(),
        category: input.category.clone(),
        manufacturer: input.manufacturer.clone(),
        price: input.price,
        stock_quantity: input.stock_quantity,
        image_url: input.image_url.clone(),
        dosage_form: input.dosage_form.clone(),
        strength: input.strength.clone(),
        prescription_required: input.prescription_required,
        active_ingredients: input.active_ingredients.clone(),
        side_effects: input.side_effects.clone(),
        warnings: input.warnings.clone(),
        is_available: input.is_available,
        created_at: repo::now_utc(),
    };
    repo::insert_medication(conn, &med)?;

    hub.publish(&ChangeEvent::insert(
        Resource::Medications,
        med.id,
        serde_json::to_value(&med).unwrap_or_default(),
    ));
    tracing::info!(medication_id = %med.id, name = %med.name, "medication added");

    Ok(med)
}

/// Overwrite a medication. Concurrent edits are last-write-wins.
pub fn edit_medication(
    conn: &Connection,
    hub: &ChangeHub,
    actor: &Actor,
    id: &Uuid,
    input: &MedicationInput,
) -> Result<Medication, AdminError> {
    if !authorize(actor, &Action::ManageCatalog).allowed {
        return Err(AdminError::Forbidden);
    }
    validate_medication(input)?;

    let mut input = input.clone();
    input.name = input.name.trim().to_string();
    let affected = repo::update_medication(conn, id, &input)?;
    if affected == 0 {
        return Err(AdminError::MedicationNotFound);
    }
    let med = repo::get_medication(conn, id)?.ok_or(AdminError::MedicationNotFound)?;

    hub.publish(&ChangeEvent::update(
        Resource::Medications,
        med.id,
        serde_json::to_value(&med).unwrap_or_default(),
    ));

    Ok(med)
}

/// Drop a medication from the catalog. Deleting an id that is already gone
/// succeeds; the row simply stays absent. Returns whether a row went away.
pub fn remove_medication(
    conn: &Connection,
    hub: &ChangeHub,
    actor: &Actor,
    id: &Uuid,
) -> Result<bool, AdminError> {
    if !authorize(actor, &Action::ManageCatalog).allowed {
        return Err(AdminError::Forbidden);
    }

    let affected = repo::delete_medication(conn, id)?;
    if affected > 0 {
        hub.publish(&ChangeEvent::delete(Resource::Medications, *id));
        tracing::info!(medication_id = %id, "medication removed");
    }
    Ok(affected > 0)
}
