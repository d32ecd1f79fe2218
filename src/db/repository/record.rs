use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use uuid::Uuid;

use super::{timestamp_column, uuid_column, upsert_patient};
use crate::db::DatabaseError;
use crate::models::*;

/// Append a clinical record for `patient_name`, creating the patient on first reference.
///
/// Patient creation and the append commit together; a failed append leaves no new patient.
pub fn insert_record(
    conn: &Connection,
    patient_name: &str,
    record_type: &str,
    content: &str,
    source: &str,
) -> Result<ClinicalRecord, DatabaseError> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let patient = upsert_patient(&tx, &NewPatient::named(patient_name))?;
    let record = ClinicalRecord {
        id: Uuid::new_v4(),
        patient_id: patient.id,
        created_at: now_utc(),
        record_type: record_type.to_string(),
        content: content.to_string(),
        source: source.to_string(),
    };

    tx.execute(
        "INSERT INTO patient_records (record_id, patient_id, created_at, record_type, content, source)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.id.to_string(),
            record.patient_id.to_string(),
            format_timestamp(&record.created_at),
            record.record_type,
            record.content,
            record.source,
        ],
    )?;
    tx.commit()?;
    Ok(record)
}

/// Most recent records first. Unknown patients yield an empty list.
pub fn get_patient_records(
    conn: &Connection,
    patient_name: &str,
    limit: usize,
) -> Result<Vec<ClinicalRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT r.record_id, r.patient_id, r.created_at, r.record_type, r.content, r.source
         FROM patient_records r
         JOIN patients p ON p.patient_id = r.patient_id
         WHERE p.name = ?1
         ORDER BY r.created_at DESC, r.rowid DESC
         LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![patient_name.trim(), limit as i64], |row| {
        Ok(ClinicalRecord {
            id: uuid_column(row, 0)?,
            patient_id: uuid_column(row, 1)?,
            created_at: timestamp_column(row, 2)?,
            record_type: row.get(3)?,
            content: row.get(4)?,
            source: row.get(5)?,
        })
    })?;

    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Whether `patient_name` already has a record imported from `source`.
pub fn has_record_from_source(
    conn: &Connection,
    patient_name: &str,
    source: &str,
) -> Result<bool, DatabaseError> {
    let exists = conn.query_row(
        "SELECT EXISTS(
             SELECT 1 FROM patient_records r
             JOIN patients p ON p.patient_id = r.patient_id
             WHERE p.name = ?1 AND r.source = ?2)",
        params![patient_name.trim(), source],
        |row| row.get(0),
    )?;
    Ok(exists)
}
