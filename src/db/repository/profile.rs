use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::UserRole;
use crate::models::{DoctorListing, ProfileUpdate, UserProfile};

use super::{fmt_ts, parse_ts};

pub fn insert_profile(
    conn: &Connection,
    profile: &UserProfile,
    password_hash: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO profiles
         (id, email, password_hash, full_name, role, phone, gender, address, age,
          specialization, license_number, years_of_experience, education, bio,
          consultation_fee, available_days, available_hours, is_active,
          created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                 ?15, ?16, ?17, ?18, ?19, ?20)",
        params![
            profile.id.to_string(),
            profile.email,
            password_hash,
            profile.full_name,
            profile.role.as_str(),
            profile.phone,
            profile.gender,
            profile.address,
            profile.age,
            profile.specialization,
            profile.license_number,
            profile.years_of_experience,
            profile.education,
            profile.bio,
            profile.consultation_fee,
            profile.available_days,
            profile.available_hours,
            profile.is_active,
            fmt_ts(profile.created_at),
            fmt_ts(profile.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_profile(conn: &Connection, id: &Uuid) -> Result<Option<UserProfile>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, email, full_name, role, phone, gender, address, age,
                specialization, license_number, years_of_experience, education, bio,
                consultation_fee, available_days, available_hours, is_active,
                suspended_at, suspended_by, suspension_reason, created_at, updated_at
         FROM profiles WHERE id = ?1",
        params![id.to_string()],
        profile_row,
    );

    match result {
        Ok(row) => Ok(Some(profile_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_profile_by_email(
    conn: &Connection,
    email: &str,
) -> Result<Option<UserProfile>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, email, full_name, role, phone, gender, address, age,
                specialization, license_number, years_of_experience, education, bio,
                consultation_fee, available_days, available_hours, is_active,
                suspended_at, suspended_by, suspension_reason, created_at, updated_at
         FROM profiles WHERE email = ?1",
        params![email],
        profile_row,
    );

    match result {
        Ok(row) => Ok(Some(profile_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Look up the stored password hash for an email. Returns the profile id
/// alongside so login can proceed without a second query.
pub fn get_credentials(
    conn: &Connection,
    email: &str,
) -> Result<Option<(Uuid, String)>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, password_hash FROM profiles WHERE email = ?1",
        params![email],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
            ))
        },
    );

    match result {
        Ok((id, hash)) => {
            let id = Uuid::parse_str(&id)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;
            Ok(Some((id, hash)))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Stored hash by profile id, for password-change verification.
pub fn get_password_hash(conn: &Connection, id: &Uuid) -> Result<Option<String>, DatabaseError> {
    let result = conn.query_row(
        "SELECT password_hash FROM profiles WHERE id = ?1",
        params![id.to_string()],
        |row| row.get::<_, String>(0),
    );

    match result {
        Ok(hash) => Ok(Some(hash)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Patch a profile in place; `None` fields keep their current value.
pub fn update_profile(
    conn: &Connection,
    id: &Uuid,
    update: &ProfileUpdate,
    now: chrono::NaiveDateTime,
) -> Result<usize, DatabaseError> {
    let affected = conn.execute(
        "UPDATE profiles SET
            full_name = COALESCE(?2, full_name),
            phone = COALESCE(?3, phone),
            gender = COALESCE(?4, gender),
            address = COALESCE(?5, address),
            age = COALESCE(?6, age),
            specialization = COALESCE(?7, specialization),
            license_number = COALESCE(?8, license_number),
            years_of_experience = COALESCE(?9, years_of_experience),
            education = COALESCE(?10, education),
            bio = COALESCE(?11, bio),
            consultation_fee = COALESCE(?12, consultation_fee),
            available_days = COALESCE(?13, available_days),
            available_hours = COALESCE(?14, available_hours),
            updated_at = ?15
         WHERE id = ?1",
        params![
            id.to_string(),
            update.full_name,
            update.phone,
            update.gender,
            update.address,
            update.age,
            update.specialization,
            update.license_number,
            update.years_of_experience,
            update.education,
            update.bio,
            update.consultation_fee,
            update.available_days,
            update.available_hours,
            fmt_ts(now),
        ],
    )?;
    Ok(affected)
}

pub fn update_password_hash(
    conn: &Connection,
    id: &Uuid,
    password_hash: &str,
    now: chrono::NaiveDateTime,
) -> Result<usize, DatabaseError> {
    let affected = conn.execute(
        "UPDATE profiles SET password_hash = ?2, updated_at = ?3 WHERE id = ?1",
        params![id.to_string(), password_hash, fmt_ts(now)],
    )?;
    Ok(affected)
}

pub fn list_profiles(
    conn: &Connection,
    role: Option<UserRole>,
) -> Result<Vec<UserProfile>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, email, full_name, role, phone, gender, address, age,
                specialization, license_number, years_of_experience, education, bio,
                consultation_fee, available_days, available_hours, is_active,
                suspended_at, suspended_by, suspension_reason, created_at, updated_at
         FROM profiles
         WHERE (?1 IS NULL OR role = ?1)
         ORDER BY created_at DESC",
    )?;

    let rows = stmt.query_map(params![role.map(|r| r.as_str())], profile_row)?;

    let mut profiles = Vec::new();
    for row in rows {
        profiles.push(profile_from_row(row?)?);
    }
    Ok(profiles)
}

/// Active doctors only, for the patient-facing directory.
pub fn list_active_doctors(conn: &Connection) -> Result<Vec<DoctorListing>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, full_name, specialization, years_of_experience, consultation_fee,
                bio, available_days, available_hours
         FROM profiles
         WHERE role = 'doctor' AND is_active = 1
         ORDER BY full_name ASC",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, Option<i64>>(3)?,
            row.get::<_, Option<f64>>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, Option<String>>(6)?,
            row.get::<_, Option<String>>(7)?,
        ))
    })?;

    let mut doctors = Vec::new();
    for row in rows {
        let (id, full_name, specialization, years, fee, bio, days, hours) = row?;
        doctors.push(DoctorListing {
            id: Uuid::parse_str(&id)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            full_name,
            specialization,
            years_of_experience: years,
            consultation_fee: fee,
            bio,
            available_days: days,
            available_hours: hours,
        });
    }
    Ok(doctors)
}

pub fn count_profiles_by_role(conn: &Connection, role: UserRole) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM profiles WHERE role = ?1",
        params![role.as_str()],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(count)
}

pub fn suspend_profile(
    conn: &Connection,
    id: &Uuid,
    suspended_by: &Uuid,
    reason: &str,
    now: chrono::NaiveDateTime,
) -> Result<usize, DatabaseError> {
    let affected = conn.execute(
        "UPDATE profiles SET is_active = 0, suspended_at = ?2, suspended_by = ?3,
                suspension_reason = ?4, updated_at = ?5
         WHERE id = ?1",
        params![
            id.to_string(),
            fmt_ts(now),
            suspended_by.to_string(),
            reason,
            fmt_ts(now),
        ],
    )?;
    Ok(affected)
}

pub fn activate_profile(
    conn: &Connection,
    id: &Uuid,
    now: chrono::NaiveDateTime,
) -> Result<usize, DatabaseError> {
    let affected = conn.execute(
        "UPDATE profiles SET is_active = 1, suspended_at = NULL, suspended_by = NULL,
                suspension_reason = NULL, updated_at = ?2
         WHERE id = ?1",
        params![id.to_string(), fmt_ts(now)],
    )?;
    Ok(affected)
}

struct ProfileRow {
    id: String,
    email: String,
    full_name: String,
    role: String,
    phone: Option<String>,
    gender: Option<String>,
    address: Option<String>,
    age: Option<i64>,
    specialization: Option<String>,
    license_number: Option<String>,
    years_of_experience: Option<i64>,
    education: Option<String>,
    bio: Option<String>,
    consultation_fee: Option<f64>,
    available_days: Option<String>,
    available_hours: Option<String>,
    is_active: bool,
    suspended_at: Option<String>,
    suspended_by: Option<String>,
    suspension_reason: Option<String>,
    created_at: String,
    updated_at: String,
}

fn profile_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProfileRow> {
    Ok(ProfileRow {
        id: row.get(0)?,
        email: row.get(1)?,
        full_name: row.get(2)?,
        role: row.get(3)?,
        phone: row.get(4)?,
        gender: row.get(5)?,
        address: row.get(6)?,
        age: row.get(7)?,
        specialization: row.get(8)?,
        license_number: row.get(9)?,
        years_of_experience: row.get(10)?,
        education: row.get(11)?,
        bio: row.get(12)?,
        consultation_fee: row.get(13)?,
        available_days: row.get(14)?,
        available_hours: row.get(15)?,
        is_active: row.get(16)?,
        suspended_at: row.get(17)?,
        suspended_by: row.get(18)?,
        suspension_reason: row.get(19)?,
        created_at: row.get(20)?,
        updated_at: row.get(21)?,
    })
}

fn profile_from_row(row: ProfileRow) -> Result<UserProfile, DatabaseError> {
    Ok(UserProfile {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        email: row.email,
        full_name: row.full_name,
        role: UserRole::from_str(&row.role)?,
        phone: row.phone,
        gender: row.gender,
        address: row.address,
        age: row.age,
        specialization: row.specialization,
        license_number: row.license_number,
        years_of_experience: row.years_of_experience,
        education: row.education,
        bio: row.bio,
        consultation_fee: row.consultation_fee,
        available_days: row.available_days,
        available_hours: row.available_hours,
        is_active: row.is_active,
        suspended_at: row.suspended_at.as_deref().map(parse_ts),
        suspended_by: row
            .suspended_by
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        suspension_reason: row.suspension_reason,
        created_at: parse_ts(&row.created_at),
        updated_at: parse_ts(&row.updated_at),
    })
}
