use crate::db::{repository, DatabaseError};
use crate::models::{IntentKind, Practitioner};
use crate::pipeline::BookingRequest;
use crate::scheduling::{
    commit_booking, find_available_slots, parse_date_hint, pick_time_window, SchedulingError,
};

use super::{
    patient_or_default, ActionOutcome, ActionPayload, HandlerContext, MSG_BOOKING_REJECTED,
    MSG_NO_PRACTITIONERS, MSG_NO_SLOTS, MSG_SLOT_TAKEN,
};

/// How many times a booking re-runs slot discovery after losing a commit race.
pub const BOOKING_ATTEMPTS: usize = 3;

pub const DEFAULT_REASON: &str = "Consultation";

/// Book the earliest free slot matching the request.
pub fn handle_booking(
    ctx: &HandlerContext<'_>,
    req: &BookingRequest,
) -> Result<ActionOutcome, DatabaseError> {
    let patient = patient_or_default(req.patient_name.as_deref());
    let practitioners = repository::find_practitioners(ctx.conn, req.specialty.as_deref())?;

    let Some(doctor) = choose_practitioner(&practitioners, req.doctor.as_deref()) else {
        tracing::info!(specialty = ?req.specialty, "No practitioner matches booking request");
        return Ok(ActionOutcome::failed(
            IntentKind::BookAppointment,
            ActionPayload::NoPractitioner { patient },
            MSG_NO_PRACTITIONERS,
        ));
    };

    let day = parse_date_hint(req.date_hint.as_deref(), ctx.today);
    let window = pick_time_window(req.time_hint.as_deref());
    let reason = req
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_REASON);

    for attempt in 1..=BOOKING_ATTEMPTS {
        let slots = find_available_slots(ctx.conn, &doctor.id, day, window, ctx.slot_minutes)?;
        let Some(slot) = slots.first() else {
            return Ok(ActionOutcome::failed(
                IntentKind::BookAppointment,
                ActionPayload::NoSlots {
                    doctor: doctor.clone(),
                    day,
                    window,
                },
                MSG_NO_SLOTS,
            ));
        };

        match commit_booking(ctx.conn, &patient, &doctor.id, slot.start, slot.end, reason) {
            Ok(appointment) => {
                return Ok(ActionOutcome::succeeded(
                    IntentKind::BookAppointment,
                    ActionPayload::Booked {
                        patient,
                        appointment,
                        doctor: doctor.clone(),
                        day,
                    },
                ));
            }
            Err(SchedulingError::Conflict { start, .. }) => {
                tracing::warn!(attempt, doctor = %doctor.name, %start, "Slot taken before commit, retrying");
            }
            Err(other) => return rejected(doctor, day, other),
        }
    }

    Ok(ActionOutcome::failed(
        IntentKind::BookAppointment,
        ActionPayload::SlotTaken {
            doctor: doctor.clone(),
            day,
            attempts: BOOKING_ATTEMPTS,
        },
        MSG_SLOT_TAKEN,
    ))
}

/// Storage failures propagate; any other refusal from the scheduler is reported as an outcome.
fn rejected(
    doctor: &Practitioner,
    day: chrono::NaiveDate,
    err: SchedulingError,
) -> Result<ActionOutcome, DatabaseError> {
    match err {
        SchedulingError::Database(e) => Err(e),
        other => {
            tracing::warn!(doctor = %doctor.name, %day, error = %other, "Booking rejected");
            Ok(ActionOutcome::failed(
                IntentKind::BookAppointment,
                ActionPayload::BookingRejected {
                    doctor: doctor.clone(),
                    day,
                    reason: other.to_string(),
                },
                MSG_BOOKING_REJECTED,
            ))
        }
    }
}

/// First practitioner whose name contains the hint (case-insensitive), else the first listed.
fn choose_practitioner<'p>(
    practitioners: &'p [Practitioner],
    doctor_hint: Option<&str>,
) -> Option<&'p Practitioner> {
    let hint = doctor_hint
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_lowercase);

    hint.and_then(|h| {
        practitioners
            .iter()
            .find(|p| p.name.to_lowercase().contains(&h))
    })
    .or_else(|| practitioners.first())
}
