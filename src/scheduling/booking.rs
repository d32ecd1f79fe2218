use chrono::NaiveDateTime;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use uuid::Uuid;

use super::SchedulingError;
use crate::db::{repository, DatabaseError};
use crate::models::{now_utc, Appointment, AppointmentStatus, NewPatient};

/// Atomically book `[start, end)` with a practitioner.
///
/// The overlap check and the insert run in one IMMEDIATE transaction: the write
/// lock is taken before the check, so two sessions racing for the same interval
/// cannot both pass it. The loser gets `SchedulingError::Conflict` and nothing is
/// written. The patient is created on first reference inside the same transaction.
pub fn commit_booking(
    conn: &Connection,
    patient_name: &str,
    doctor_id: &Uuid,
    start: NaiveDateTime,
    end: NaiveDateTime,
    reason: &str,
) -> Result<Appointment, SchedulingError> {
    if start >= end {
        return Err(SchedulingError::InvalidInterval { start, end });
    }

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(DatabaseError::from)?;

    if repository::get_practitioner(&tx, doctor_id)?.is_none() {
        return Err(SchedulingError::UnknownPractitioner(*doctor_id));
    }

    if repository::count_overlapping(&tx, doctor_id, &start, &end)? > 0 {
        tracing::info!(%doctor_id, %start, %end, "Booking rejected, interval already taken");
        return Err(SchedulingError::Conflict {
            doctor_id: *doctor_id,
            start,
            end,
        });
    }

    let patient = repository::upsert_patient(&tx, &NewPatient::named(patient_name))?;
    let appointment = Appointment {
        id: Uuid::new_v4(),
        patient_id: patient.id,
        doctor_id: *doctor_id,
        start,
        end,
        status: AppointmentStatus::Booked,
        reason: reason.to_string(),
        created_at: now_utc(),
    };
    repository::insert_appointment(&tx, &appointment)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(
        appointment_id = %appointment.id,
        %doctor_id,
        %start,
        "Appointment booked"
    );
    Ok(appointment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{count_appointments, find_patient_by_name, insert_practitioner};
    use crate::db::sqlite::{open_database, open_memory_database};
    use chrono::NaiveDate;
    use std::sync::{Arc, Barrier};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn booking_creates_patient_on_first_reference() {
        let conn = open_memory_database().unwrap();
        let smith = insert_practitioner(&conn, "Dr. Smith", Some("Cardiology")).unwrap();
        assert!(find_patient_by_name(&conn, "Ravi").unwrap().is_none());

        let appt = commit_booking(&conn, "Ravi", &smith.id, at(10, 0), at(10, 30), "Checkup").unwrap();

        let ravi = find_patient_by_name(&conn, "Ravi").unwrap().unwrap();
        assert_eq!(appt.patient_id, ravi.id);
        assert_eq!(appt.status, AppointmentStatus::Booked);
        assert_eq!(appt.reason, "Checkup");
    }

    #[test]
    fn overlapping_booking_is_a_conflict() {
        let conn = open_memory_database().unwrap();
        let smith = insert_practitioner(&conn, "Dr. Smith", None).unwrap();
        commit_booking(&conn, "Anjali", &smith.id, at(10, 0), at(10, 30), "Consultation").unwrap();

        let err = commit_booking(&conn, "Ravi", &smith.id, at(10, 15), at(10, 45), "Consultation")
            .unwrap_err();
        assert!(matches!(err, SchedulingError::Conflict { .. }));
        assert_eq!(count_appointments(&conn).unwrap(), 1);
        // The losing booking must not leave its patient behind.
        assert!(find_patient_by_name(&conn, "Ravi").unwrap().is_none());
    }

    #[test]
    fn adjacent_bookings_are_allowed() {
        let conn = open_memory_database().unwrap();
        let smith = insert_practitioner(&conn, "Dr. Smith", None).unwrap();
        commit_booking(&conn, "Anjali", &smith.id, at(10, 0), at(10, 30), "a").unwrap();
        commit_booking(&conn, "Ravi", &smith.id, at(10, 30), at(11, 0), "b").unwrap();
        commit_booking(&conn, "Meera", &smith.id, at(9, 30), at(10, 0), "c").unwrap();
        assert_eq!(count_appointments(&conn).unwrap(), 3);
    }

    #[test]
    fn different_practitioners_do_not_conflict() {
        let conn = open_memory_database().unwrap();
        let smith = insert_practitioner(&conn, "Dr. Smith", None).unwrap();
        let patel = insert_practitioner(&conn, "Dr. Patel", None).unwrap();
        commit_booking(&conn, "Anjali", &smith.id, at(10, 0), at(10, 30), "a").unwrap();
        commit_booking(&conn, "Anjali", &patel.id, at(10, 0), at(10, 30), "b").unwrap();
        assert_eq!(count_appointments(&conn).unwrap(), 2);
    }

    #[test]
    fn inverted_interval_rejected() {
        let conn = open_memory_database().unwrap();
        let smith = insert_practitioner(&conn, "Dr. Smith", None).unwrap();
        let err = commit_booking(&conn, "Anjali", &smith.id, at(10, 0), at(10, 0), "x").unwrap_err();
        assert!(matches!(err, SchedulingError::InvalidInterval { .. }));
    }

    #[test]
    fn unknown_practitioner_rejected() {
        let conn = open_memory_database().unwrap();
        let err = commit_booking(&conn, "Anjali", &Uuid::new_v4(), at(10, 0), at(10, 30), "x")
            .unwrap_err();
        assert!(matches!(err, SchedulingError::UnknownPractitioner(_)));
        assert!(find_patient_by_name(&conn, "Anjali").unwrap().is_none());
    }

    #[test]
    fn concurrent_sessions_book_same_slot_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("race.db");
        let doctor_id = {
            let conn = open_database(&path).unwrap();
            insert_practitioner(&conn, "Dr. Smith", None).unwrap().id
        };

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = ["Anjali", "Ravi"]
            .into_iter()
            .map(|name| {
                let path = path.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    let conn = open_database(&path).unwrap();
                    barrier.wait();
                    commit_booking(&conn, name, &doctor_id, at(10, 0), at(10, 30), "Consultation")
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let wins = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(SchedulingError::Conflict { .. })))
            .count();
        assert_eq!(wins, 1);
        assert_eq!(conflicts, 1);

        let conn = open_database(&path).unwrap();
        assert_eq!(count_appointments(&conn).unwrap(), 1);
    }
}
