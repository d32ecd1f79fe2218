//! Appointment scheduling: date/time-hint resolution, slot discovery, booking commit.
//!
//! The single hard invariant is that no two appointments for one practitioner
//! overlap. Discovery (`find_available_slots`) is advisory; `commit_booking`
//! re-validates inside an IMMEDIATE transaction so concurrent bookings of the same
//! slot resolve to exactly one winner.

pub mod booking;
pub mod hints;
pub mod slots;

pub use booking::*;
pub use hints::*;
pub use slots::*;

use chrono::NaiveDateTime;
use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Invalid interval: start {start} is not before end {end}")]
    InvalidInterval {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("Practitioner {doctor_id} is already booked between {start} and {end}")]
    Conflict {
        doctor_id: Uuid,
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("Unknown practitioner: {0}")]
    UnknownPractitioner(Uuid),
}
