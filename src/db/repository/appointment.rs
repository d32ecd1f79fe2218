use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{enum_column, timestamp_column, uuid_column};
use crate::db::DatabaseError;
use crate::models::*;

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (appointment_id, patient_id, doctor_id, start_time, end_time,
         status, reason, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            appt.id.to_string(),
            appt.patient_id.to_string(),
            appt.doctor_id.to_string(),
            format_timestamp(&appt.start),
            format_timestamp(&appt.end),
            appt.status.as_str(),
            appt.reason,
            format_timestamp(&appt.created_at),
        ],
    )?;
    Ok(())
}

/// `[start, end)` of every appointment for `doctor_id` that intersects `day`, earliest first.
///
/// Includes bookings that began the previous day and run past midnight.
pub fn booked_intervals_on(
    conn: &Connection,
    doctor_id: &Uuid,
    day: NaiveDate,
) -> Result<Vec<(NaiveDateTime, NaiveDateTime)>, DatabaseError> {
    let day_start = day.and_hms_opt(0, 0, 0).unwrap_or_default();
    let next_day = day_start + Duration::days(1);

    let mut stmt = conn.prepare(
        "SELECT start_time, end_time FROM appointments
         WHERE doctor_id = ?1 AND start_time < ?3 AND end_time > ?2
         ORDER BY start_time",
    )?;
    let rows = stmt.query_map(
        params![
            doctor_id.to_string(),
            format_timestamp(&day_start),
            format_timestamp(&next_day),
        ],
        |row| Ok((timestamp_column(row, 0)?, timestamp_column(row, 1)?)),
    )?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Number of appointments for `doctor_id` intersecting the half-open `[start, end)`.
pub fn count_overlapping(
    conn: &Connection,
    doctor_id: &Uuid,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM appointments
         WHERE doctor_id = ?1 AND start_time < ?3 AND end_time > ?2",
        params![
            doctor_id.to_string(),
            format_timestamp(start),
            format_timestamp(end),
        ],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn count_appointments(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM appointments", [], |row| row.get(0))?;
    Ok(count)
}

/// Dashboard listing, latest start first.
pub fn list_appointments(
    conn: &Connection,
    limit: usize,
) -> Result<Vec<AppointmentSummary>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT a.appointment_id, p.name, d.name, d.specialty, a.start_time, a.end_time,
                a.status, a.reason
         FROM appointments a
         JOIN patients p ON p.patient_id = a.patient_id
         JOIN practitioners d ON d.doctor_id = a.doctor_id
         ORDER BY a.start_time DESC
         LIMIT ?1",
    )?;

    let rows = stmt.query_map(params![limit as i64], |row| {
        Ok(AppointmentSummary {
            id: uuid_column(row, 0)?,
            patient: row.get(1)?,
            doctor: row.get(2)?,
            specialty: row.get(3)?,
            start: timestamp_column(row, 4)?,
            end: timestamp_column(row, 5)?,
            status: enum_column(row, 6)?,
            reason: row.get(7)?,
        })
    })?;

    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}
