//! Accounts and sessions: signup, login, logout, password changes.
//!
//! Passwords are stored as PBKDF2-SHA256 PHC strings. Bearer tokens carry
//! 32 bytes of entropy and only their SHA-256 hash ever reaches the
//! database, so a leaked sessions table cannot be replayed.

use std::sync::LazyLock;

use base64::Engine;
use chrono::Duration;
use pbkdf2::password_hash::rand_core::OsRng;
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use regex::Regex;
use rusqlite::Connection;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::db::repository::{
    self as repo, delete_session, get_credentials, get_password_hash, get_profile,
    get_profile_by_email, insert_profile, insert_session, purge_expired_sessions,
    update_password_hash,
};
use crate::db::DatabaseError;
use crate::models::enums::UserRole;
use crate::models::UserProfile;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const SESSION_TTL_DAYS: i64 = 7;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Account not found. Please check your email or sign up.")]
    AccountNotFound,

    #[error("Invalid credentials. Please check your password.")]
    InvalidCredentials,

    #[error("An account with this email already exists")]
    EmailTaken,

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("This account has been suspended")]
    AccountSuspended { reason: Option<String> },

    #[error("Password must be at least {MIN_PASSWORD_LEN} characters long")]
    WeakPassword,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Accounts can only be created as patient or doctor")]
    RoleNotAllowed,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Signup payload. Doctor-specific fields are ignored for patients.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: UserRole,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(default)]
    pub specialization: Option<String>,
    #[serde(default)]
    pub license_number: Option<String>,
    #[serde(default)]
    pub years_of_experience: Option<i64>,
    #[serde(default)]
    pub education: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub consultation_fee: Option<f64>,
}

/// Local validation, run before anything touches the database.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword);
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), AuthError> {
    static EMAIL_SHAPE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());
    if EMAIL_SHAPE.is_match(email) {
        Ok(())
    } else {
        Err(AuthError::InvalidEmail)
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Pbkdf2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

pub fn verify_password(password: &str, stored: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(stored).map_err(|e| AuthError::Hashing(e.to_string()))?;
    Ok(Pbkdf2.verify_password(password.as_bytes(), &parsed).is_ok())
}

/// Generate a random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a bearer token string using SHA-256, encoded for the TEXT column.
pub fn hash_token(token: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(token.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

/// Create a new account and sign it in. Returns the profile and the raw
/// session token; the token is shown once and never stored.
pub fn signup(conn: &Connection, account: &NewAccount) -> Result<(UserProfile, String), AuthError> {
    validate_password(&account.password)?;
    if account.role == UserRole::Admin {
        return Err(AuthError::RoleNotAllowed);
    }

    let email = account.email.trim().to_lowercase();
    validate_email(&email)?;
    if get_profile_by_email(conn, &email)?.is_some() {
        return Err(AuthError::EmailTaken);
    }

    let now = repo::now_utc();
    let profile = UserProfile {
        id: Uuid::new_v4(),
        email,
        full_name: account.full_name.trim().to_string(),
        role: account.role,
        phone: account.phone.clone(),
        gender: account.gender.clone(),
        address: account.address.clone(),
        age: account.age,
        specialization: account.specialization.clone(),
        license_number: account.license_number.clone(),
        years_of_experience: account.years_of_experience,
        education: account.education.clone(),
        bio: account.bio.clone(),
        consultation_fee: account.consultation_fee,
        available_days: None,
        available_hours: None,
        is_active: true,
        suspended_at: None,
        suspended_by: None,
        suspension_reason: None,
        created_at: now,
        updated_at: now,
    };

    let password_hash = hash_password(&account.password)?;
    match insert_profile(conn, &profile, &password_hash) {
        Ok(()) => {}
        // Two signups racing on the same email: the UNIQUE index decides.
        Err(e) if e.is_unique_violation() => return Err(AuthError::EmailTaken),
        Err(e) => return Err(e.into()),
    }

    let token = open_session(conn, &profile.id)?;
    Ok((profile, token))
}

/// Sign in with email + password. Unknown email and wrong password are
/// distinct failures so the form can show specific copy for each.
pub fn login(conn: &Connection, email: &str, password: &str) -> Result<(UserProfile, String), AuthError> {
    let email = email.trim().to_lowercase();
    let (user_id, stored_hash) =
        get_credentials(conn, &email)?.ok_or(AuthError::AccountNotFound)?;

    if !verify_password(password, &stored_hash)? {
        return Err(AuthError::InvalidCredentials);
    }

    let profile = get_profile(conn, &user_id)?.ok_or(AuthError::AccountNotFound)?;
    if !profile.is_active {
        return Err(AuthError::AccountSuspended {
            reason: profile.suspension_reason.clone(),
        });
    }

    // Cheap housekeeping while we hold the connection anyway.
    purge_expired_sessions(conn, repo::now_utc())?;

    let token = open_session(conn, &profile.id)?;
    Ok((profile, token))
}

/// Drop the presented session. Logging out an already-dead token is fine.
pub fn logout(conn: &Connection, token: &str) -> Result<(), AuthError> {
    delete_session(conn, &hash_token(token))?;
    Ok(())
}

/// Change a signed-in user's password. Both local checks run before any
/// database read, matching the form-side validation order.
pub fn change_password(
    conn: &Connection,
    user_id: &Uuid,
    current: &str,
    new_password: &str,
    confirm: &str,
) -> Result<(), AuthError> {
    if new_password != confirm {
        return Err(AuthError::PasswordMismatch);
    }
    validate_password(new_password)?;

    let stored = get_password_hash(conn, user_id)?.ok_or(AuthError::AccountNotFound)?;
    if !verify_password(current, &stored)? {
        return Err(AuthError::InvalidCredentials);
    }

    let new_hash = hash_password(new_password)?;
    update_password_hash(conn, user_id, &new_hash, repo::now_utc())?;
    Ok(())
}

fn open_session(conn: &Connection, user_id: &Uuid) -> Result<String, AuthError> {
    let token = generate_token();
    let now = repo::now_utc();
    insert_session(
        conn,
        &hash_token(&token),
        user_id,
        now,
        now + Duration::days(SESSION_TTL_DAYS),
    )?;
    Ok(token)
}
