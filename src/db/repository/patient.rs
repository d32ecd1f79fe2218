use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::uuid_column;
use crate::db::DatabaseError;
use crate::models::*;

const PATIENT_COLUMNS: &str = "patient_id, name, dob, gender, phone, email";

fn row_to_patient(row: &rusqlite::Row) -> Result<Patient, rusqlite::Error> {
    Ok(Patient {
        id: uuid_column(row, 0)?,
        name: row.get(1)?,
        dob: row.get(2)?,
        gender: row.get(3)?,
        phone: row.get(4)?,
        email: row.get(5)?,
    })
}

/// Insert the patient if the name is new, then return the single row for that name.
///
/// Concurrent first-time creation of the same name resolves to one row: the losing
/// insert is absorbed by `ON CONFLICT DO NOTHING` and both callers read the winner.
pub fn upsert_patient(conn: &Connection, new: &NewPatient) -> Result<Patient, DatabaseError> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(DatabaseError::ConstraintViolation(
            "patient name must not be empty".into(),
        ));
    }

    conn.execute(
        "INSERT INTO patients (patient_id, name, dob, gender, phone, email)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(name) DO NOTHING",
        params![
            Uuid::new_v4().to_string(),
            name,
            new.dob,
            new.gender,
            new.phone,
            new.email,
        ],
    )?;

    find_patient_by_name(conn, name)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "Patient".into(),
        id: name.to_string(),
    })
}

pub fn find_patient_by_name(conn: &Connection, name: &str) -> Result<Option<Patient>, DatabaseError> {
    let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE name = ?1");
    conn.query_row(&sql, params![name.trim()], row_to_patient)
        .optional()
        .map_err(DatabaseError::from)
}

/// The earliest registered patient.
pub fn first_registered_patient(conn: &Connection) -> Result<Option<Patient>, DatabaseError> {
    let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients ORDER BY rowid LIMIT 1");
    conn.query_row(&sql, [], row_to_patient)
        .optional()
        .map_err(DatabaseError::from)
}

/// Patients ordered by name.
pub fn list_patients(conn: &Connection, limit: usize) -> Result<Vec<Patient>, DatabaseError> {
    let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients ORDER BY name LIMIT ?1");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![limit as i64], row_to_patient)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}
