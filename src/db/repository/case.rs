use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::{CaseStatus, EmergencyLevel};
use crate::models::{CaseFilter, MedicalCase};

use super::{fmt_ts, parse_ts};

pub fn insert_case(conn: &Connection, case: &MedicalCase) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medical_cases
         (id, patient_id, doctor_id, case_reason, description, emergency_level,
          status, hidden_from_doctor, created_at, accepted_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            case.id.to_string(),
            case.patient_id.to_string(),
            case.doctor_id.map(|d| d.to_string()),
            case.case_reason,
            case.description,
            case.emergency_level.as_str(),
            case.status.as_str(),
            case.hidden_from_doctor,
            fmt_ts(case.created_at),
            case.accepted_at.map(fmt_ts),
            fmt_ts(case.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_case(conn: &Connection, id: &Uuid) -> Result<Option<MedicalCase>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, patient_id, doctor_id, case_reason, description, emergency_level,
                status, hidden_from_doctor, created_at, accepted_at, updated_at
         FROM medical_cases WHERE id = ?1",
        params![id.to_string()],
        case_row,
    );

    match result {
        Ok(row) => Ok(Some(case_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// The doctor's work queue: unassigned pending cases plus the doctor's own,
/// minus anything the doctor soft-hid. Most urgent first, then newest.
pub fn list_queue_for_doctor(
    conn: &Connection,
    doctor_id: &Uuid,
    filter: &CaseFilter,
) -> Result<Vec<MedicalCase>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, doctor_id, case_reason, description, emergency_level,
                status, hidden_from_doctor, created_at, accepted_at, updated_at
         FROM medical_cases
         WHERE ((status = 'pending' AND doctor_id IS NULL) OR doctor_id = ?1)
           AND COALESCE(hidden_from_doctor, 0) = 0
           AND (?2 IS NULL OR status = ?2)
           AND (?3 IS NULL OR emergency_level = ?3)
         ORDER BY CASE emergency_level
                    WHEN 'critical' THEN 0
                    WHEN 'high' THEN 1
                    WHEN 'medium' THEN 2
                    ELSE 3
                  END,
                  created_at DESC",
    )?;

    let rows = stmt.query_map(
        params![
            doctor_id.to_string(),
            filter.status.map(|s| s.as_str()),
            filter.emergency_level.map(|l| l.as_str()),
        ],
        case_row,
    )?;

    let mut cases = Vec::new();
    for row in rows {
        cases.push(case_from_row(row?)?);
    }
    Ok(cases)
}

pub fn list_cases_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<MedicalCase>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, doctor_id, case_reason, description, emergency_level,
                status, hidden_from_doctor, created_at, accepted_at, updated_at
         FROM medical_cases
         WHERE patient_id = ?1
         ORDER BY created_at DESC",
    )?;

    let rows = stmt.query_map(params![patient_id.to_string()], case_row)?;

    let mut cases = Vec::new();
    for row in rows {
        cases.push(case_from_row(row?)?);
    }
    Ok(cases)
}

/// Every case in the system, soft-hidden ones included. Admin oversight only.
pub fn list_all_cases(conn: &Connection) -> Result<Vec<MedicalCase>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, doctor_id, case_reason, description, emergency_level,
                status, hidden_from_doctor, created_at, accepted_at, updated_at
         FROM medical_cases
         ORDER BY created_at DESC",
    )?;

    let rows = stmt.query_map([], case_row)?;

    let mut cases = Vec::new();
    for row in rows {
        cases.push(case_from_row(row?)?);
    }
    Ok(cases)
}

/// Claim a pending case for a doctor. The status guard makes this a single
/// conditional write: when two doctors race, the store applies one update and
/// the loser sees zero affected rows.
pub fn accept_case(
    conn: &Connection,
    case_id: &Uuid,
    doctor_id: &Uuid,
    now: chrono::NaiveDateTime,
) -> Result<usize, DatabaseError> {
    let affected = conn.execute(
        "UPDATE medical_cases
         SET doctor_id = ?2, status = 'accepted', accepted_at = ?3, updated_at = ?3
         WHERE id = ?1 AND status = 'pending'",
        params![case_id.to_string(), doctor_id.to_string(), fmt_ts(now)],
    )?;
    Ok(affected)
}

pub fn set_case_status(
    conn: &Connection,
    case_id: &Uuid,
    status: CaseStatus,
    now: chrono::NaiveDateTime,
) -> Result<usize, DatabaseError> {
    let affected = conn.execute(
        "UPDATE medical_cases SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![case_id.to_string(), status.as_str(), fmt_ts(now)],
    )?;
    Ok(affected)
}

/// Doctor-side soft delete: the row survives for admin oversight but leaves
/// the doctor's queue and stops matching the pending pool.
pub fn hide_case(
    conn: &Connection,
    case_id: &Uuid,
    now: chrono::NaiveDateTime,
) -> Result<usize, DatabaseError> {
    let affected = conn.execute(
        "UPDATE medical_cases
         SET hidden_from_doctor = 1, status = 'cancelled', updated_at = ?2
         WHERE id = ?1",
        params![case_id.to_string(), fmt_ts(now)],
    )?;
    Ok(affected)
}

/// Patients may withdraw a case only before treatment starts.
pub fn cancel_case_by_patient(
    conn: &Connection,
    case_id: &Uuid,
    patient_id: &Uuid,
    now: chrono::NaiveDateTime,
) -> Result<usize, DatabaseError> {
    let affected = conn.execute(
        "UPDATE medical_cases
         SET status = 'cancelled', updated_at = ?3
         WHERE id = ?1 AND patient_id = ?2 AND status IN ('pending', 'accepted')",
        params![case_id.to_string(), patient_id.to_string(), fmt_ts(now)],
    )?;
    Ok(affected)
}

pub fn count_cases_by_status(
    conn: &Connection,
    status: Option<CaseStatus>,
) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM medical_cases WHERE (?1 IS NULL OR status = ?1)",
        params![status.map(|s| s.as_str())],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(count)
}

pub fn count_cases_for_doctor(
    conn: &Connection,
    doctor_id: &Uuid,
    status: Option<CaseStatus>,
) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM medical_cases
         WHERE doctor_id = ?1 AND (?2 IS NULL OR status = ?2)",
        params![doctor_id.to_string(), status.map(|s| s.as_str())],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(count)
}

struct CaseRow {
    id: String,
    patient_id: String,
    doctor_id: Option<String>,
    case_reason: String,
    description: String,
    emergency_level: String,
    status: String,
    hidden_from_doctor: Option<bool>,
    created_at: String,
    accepted_at: Option<String>,
    updated_at: String,
}

fn case_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CaseRow> {
    Ok(CaseRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        doctor_id: row.get(2)?,
        case_reason: row.get(3)?,
        description: row.get(4)?,
        emergency_level: row.get(5)?,
        status: row.get(6)?,
        hidden_from_doctor: row.get(7)?,
        created_at: row.get(8)?,
        accepted_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn case_from_row(row: CaseRow) -> Result<MedicalCase, DatabaseError> {
    Ok(MedicalCase {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        patient_id: Uuid::parse_str(&row.patient_id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        doctor_id: row
            .doctor_id
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        case_reason: row.case_reason,
        description: row.description,
        emergency_level: EmergencyLevel::from_str(&row.emergency_level)?,
        status: CaseStatus::from_str(&row.status)?,
        hidden_from_doctor: row.hidden_from_doctor.unwrap_or(false),
        created_at: parse_ts(&row.created_at),
        accepted_at: row.accepted_at.as_deref().map(parse_ts),
        updated_at: parse_ts(&row.updated_at),
    })
}

#[cfg(test)]
mod tests {
    use super::super::now_utc;
    use super::*;
    use crate::db::open_memory_database;

    fn seed_user(conn: &Connection, email: &str, role: &str) -> Uuid {
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO profiles (id, email, password_hash, full_name, role, is_active,
                                   created_at, updated_at)
             VALUES (?1, ?2, 'h', 'Seed User', ?3, 1, '2026-01-01 08:00:00', '2026-01-01 08:00:00')",
            params![id.to_string(), email, role],
        )
        .unwrap();
        id
    }

    fn make_case(patient_id: Uuid, level: EmergencyLevel, created_at: &str) -> MedicalCase {
        MedicalCase {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id: None,
            case_reason: "Persistent cough".into(),
            description: "Three days of dry cough with mild fever".into(),
            emergency_level: level,
            status: CaseStatus::Pending,
            hidden_from_doctor: false,
            created_at: parse_ts(created_at),
            accepted_at: None,
            updated_at: parse_ts(created_at),
        }
    }

    #[test]
    fn insert_and_get_round_trip() {
        let conn = open_memory_database().unwrap();
        let patient = seed_user(&conn, "p@x.test", "patient");
        let case = make_case(patient, EmergencyLevel::High, "2026-01-02 10:00:00");
        insert_case(&conn, &case).unwrap();

        let loaded = get_case(&conn, &case.id).unwrap().unwrap();
        assert_eq!(loaded.patient_id, patient);
        assert_eq!(loaded.emergency_level, EmergencyLevel::High);
        assert_eq!(loaded.status, CaseStatus::Pending);
        assert!(loaded.doctor_id.is_none());
        assert!(!loaded.hidden_from_doctor);
    }

    #[test]
    fn queue_orders_by_priority_then_recency() {
        let conn = open_memory_database().unwrap();
        let patient = seed_user(&conn, "p@x.test", "patient");
        let doctor = seed_user(&conn, "d@x.test", "doctor");

        let low = make_case(patient, EmergencyLevel::Low, "2026-01-05 10:00:00");
        let critical = make_case(patient, EmergencyLevel::Critical, "2026-01-01 10:00:00");
        let med_old = make_case(patient, EmergencyLevel::Medium, "2026-01-02 10:00:00");
        let med_new = make_case(patient, EmergencyLevel::Medium, "2026-01-03 10:00:00");
        for c in [&low, &critical, &med_old, &med_new] {
            insert_case(&conn, c).unwrap();
        }

        let queue = list_queue_for_doctor(&conn, &doctor, &CaseFilter::default()).unwrap();
        let ids: Vec<Uuid> = queue.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![critical.id, med_new.id, med_old.id, low.id]);
    }

    #[test]
    fn queue_excludes_hidden_and_foreign_cases() {
        let conn = open_memory_database().unwrap();
        let patient = seed_user(&conn, "p@x.test", "patient");
        let me = seed_user(&conn, "me@x.test", "doctor");
        let rival = seed_user(&conn, "rival@x.test", "doctor");

        let unassigned = make_case(patient, EmergencyLevel::Medium, "2026-01-01 10:00:00");
        let mine = make_case(patient, EmergencyLevel::Medium, "2026-01-01 11:00:00");
        let theirs = make_case(patient, EmergencyLevel::Medium, "2026-01-01 12:00:00");
        let hidden = make_case(patient, EmergencyLevel::Medium, "2026-01-01 13:00:00");
        for c in [&unassigned, &mine, &theirs, &hidden] {
            insert_case(&conn, c).unwrap();
        }
        accept_case(&conn, &mine.id, &me, now_utc()).unwrap();
        accept_case(&conn, &theirs.id, &rival, now_utc()).unwrap();
        accept_case(&conn, &hidden.id, &me, now_utc()).unwrap();
        hide_case(&conn, &hidden.id, now_utc()).unwrap();

        let queue = list_queue_for_doctor(&conn, &me, &CaseFilter::default()).unwrap();
        let ids: Vec<Uuid> = queue.iter().map(|c| c.id).collect();
        assert!(ids.contains(&unassigned.id));
        assert!(ids.contains(&mine.id));
        assert!(!ids.contains(&theirs.id));
        assert!(!ids.contains(&hidden.id));
    }

    #[test]
    fn accept_is_conditional_on_pending() {
        let conn = open_memory_database().unwrap();
        let patient = seed_user(&conn, "p@x.test", "patient");
        let first = seed_user(&conn, "first@x.test", "doctor");
        let second = seed_user(&conn, "second@x.test", "doctor");
        let case = make_case(patient, EmergencyLevel::High, "2026-01-01 10:00:00");
        insert_case(&conn, &case).unwrap();

        assert_eq!(accept_case(&conn, &case.id, &first, now_utc()).unwrap(), 1);
        // The losing side of the race gets zero rows and must reload.
        assert_eq!(accept_case(&conn, &case.id, &second, now_utc()).unwrap(), 0);

        let loaded = get_case(&conn, &case.id).unwrap().unwrap();
        assert_eq!(loaded.doctor_id, Some(first));
        assert_eq!(loaded.status, CaseStatus::Accepted);
        assert!(loaded.accepted_at.is_some());
    }

    #[test]
    fn accept_never_touches_terminal_cases() {
        let conn = open_memory_database().unwrap();
        let patient = seed_user(&conn, "p@x.test", "patient");
        let doctor = seed_user(&conn, "d@x.test", "doctor");
        let case = make_case(patient, EmergencyLevel::Low, "2026-01-01 10:00:00");
        insert_case(&conn, &case).unwrap();
        set_case_status(&conn, &case.id, CaseStatus::Completed, now_utc()).unwrap();

        assert_eq!(accept_case(&conn, &case.id, &doctor, now_utc()).unwrap(), 0);
        let loaded = get_case(&conn, &case.id).unwrap().unwrap();
        assert_eq!(loaded.status, CaseStatus::Completed);
        assert!(loaded.doctor_id.is_none());
    }

    #[test]
    fn patient_cancel_limited_to_early_states() {
        let conn = open_memory_database().unwrap();
        let patient = seed_user(&conn, "p@x.test", "patient");
        let other = seed_user(&conn, "o@x.test", "patient");
        let doctor = seed_user(&conn, "d@x.test", "doctor");

        let pending = make_case(patient, EmergencyLevel::Low, "2026-01-01 10:00:00");
        let started = make_case(patient, EmergencyLevel::Low, "2026-01-01 11:00:00");
        insert_case(&conn, &pending).unwrap();
        insert_case(&conn, &started).unwrap();
        accept_case(&conn, &started.id, &doctor, now_utc()).unwrap();
        set_case_status(&conn, &started.id, CaseStatus::InProgress, now_utc()).unwrap();

        // Someone else's id never matches.
        assert_eq!(
            cancel_case_by_patient(&conn, &pending.id, &other, now_utc()).unwrap(),
            0
        );
        assert_eq!(
            cancel_case_by_patient(&conn, &pending.id, &patient, now_utc()).unwrap(),
            1
        );
        assert_eq!(
            cancel_case_by_patient(&conn, &started.id, &patient, now_utc()).unwrap(),
            0
        );
        let loaded = get_case(&conn, &started.id).unwrap().unwrap();
        assert_eq!(loaded.status, CaseStatus::InProgress);
    }

    #[test]
    fn hide_preserves_row_for_admin_listing() {
        let conn = open_memory_database().unwrap();
        let patient = seed_user(&conn, "p@x.test", "patient");
        let doctor = seed_user(&conn, "d@x.test", "doctor");
        let case = make_case(patient, EmergencyLevel::Medium, "2026-01-01 10:00:00");
        insert_case(&conn, &case).unwrap();
        accept_case(&conn, &case.id, &doctor, now_utc()).unwrap();
        hide_case(&conn, &case.id, now_utc()).unwrap();

        assert!(list_queue_for_doctor(&conn, &doctor, &CaseFilter::default())
            .unwrap()
            .is_empty());
        let all = list_all_cases(&conn).unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].hidden_from_doctor);
        assert_eq!(all[0].status, CaseStatus::Cancelled);
    }

    #[test]
    fn queue_filters_by_status_and_level() {
        let conn = open_memory_database().unwrap();
        let patient = seed_user(&conn, "p@x.test", "patient");
        let doctor = seed_user(&conn, "d@x.test", "doctor");

        let low = make_case(patient, EmergencyLevel::Low, "2026-01-01 10:00:00");
        let high = make_case(patient, EmergencyLevel::High, "2026-01-01 11:00:00");
        insert_case(&conn, &low).unwrap();
        insert_case(&conn, &high).unwrap();
        accept_case(&conn, &high.id, &doctor, now_utc()).unwrap();

        let filter = CaseFilter {
            status: Some(CaseStatus::Accepted),
            ..Default::default()
        };
        let accepted = list_queue_for_doctor(&conn, &doctor, &filter).unwrap();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].id, high.id);

        let filter = CaseFilter {
            emergency_level: Some(EmergencyLevel::Low),
            ..Default::default()
        };
        let lows = list_queue_for_doctor(&conn, &doctor, &filter).unwrap();
        assert_eq!(lows.len(), 1);
        assert_eq!(lows[0].id, low.id);
    }

    #[test]
    fn status_counts_for_dashboards() {
        let conn = open_memory_database().unwrap();
        let patient = seed_user(&conn, "p@x.test", "patient");
        let doctor = seed_user(&conn, "d@x.test", "doctor");

        for (level, ts) in [
            (EmergencyLevel::Low, "2026-01-01 10:00:00"),
            (EmergencyLevel::High, "2026-01-01 11:00:00"),
            (EmergencyLevel::Medium, "2026-01-01 12:00:00"),
        ] {
            insert_case(&conn, &make_case(patient, level, ts)).unwrap();
        }
        let cases = list_cases_for_patient(&conn, &patient).unwrap();
        assert_eq!(cases.len(), 3);
        accept_case(&conn, &cases[0].id, &doctor, now_utc()).unwrap();

        assert_eq!(count_cases_by_status(&conn, None).unwrap(), 3);
        assert_eq!(
            count_cases_by_status(&conn, Some(CaseStatus::Pending)).unwrap(),
            2
        );
        assert_eq!(count_cases_for_doctor(&conn, &doctor, None).unwrap(), 1);
        assert_eq!(
            count_cases_for_doctor(&conn, &doctor, Some(CaseStatus::Completed)).unwrap(),
            0
        );
    }
}
