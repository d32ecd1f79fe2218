//! Task handlers: one per intent, each performing its side effect and reporting
//! a structured outcome.
//!
//! Resolution failures (no practitioner, no slot, no records) are outcomes with
//! `success: false`, never errors. Only storage failures propagate.

pub mod booking;
pub mod history;
pub mod info;
pub mod records;

pub use booking::*;
pub use history::*;
pub use info::*;
pub use records::*;

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

use crate::config::{Settings, DEFAULT_HISTORY_LIMIT, DEFAULT_SLOT_MINUTES};
use crate::db::DatabaseError;
use crate::models::{Appointment, ClinicalRecord, IntentKind, Practitioner};
use crate::pipeline::Intent;
use crate::scheduling::TimeWindow;

/// The handler that ran is always the one named by the intent.
pub type ActionKind = IntentKind;

pub const MSG_NO_PRACTITIONERS: &str = "no practitioners available";
pub const MSG_NO_SLOTS: &str = "no slots available";
pub const MSG_SLOT_TAKEN: &str = "slot no longer available";
pub const MSG_BOOKING_REJECTED: &str = "booking rejected";
pub const MSG_NO_RECORDS: &str = "no records found";

/// Name used when the message did not identify a patient.
pub const DEFAULT_PATIENT_NAME: &str = "Patient";

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionPayload {
    Booked {
        patient: String,
        appointment: Appointment,
        doctor: Practitioner,
        day: NaiveDate,
    },
    NoPractitioner {
        patient: String,
    },
    NoSlots {
        doctor: Practitioner,
        day: NaiveDate,
        window: TimeWindow,
    },
    SlotTaken {
        doctor: Practitioner,
        day: NaiveDate,
        attempts: usize,
    },
    BookingRejected {
        doctor: Practitioner,
        day: NaiveDate,
        reason: String,
    },
    RecordAdded {
        patient: String,
        record: ClinicalRecord,
    },
    History {
        patient: String,
        records: Vec<ClinicalRecord>,
    },
    NoRecords {
        patient: String,
    },
    Topic {
        topic: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub action: ActionKind,
    pub payload: ActionPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ActionOutcome {
    pub fn succeeded(action: ActionKind, payload: ActionPayload) -> Self {
        Self {
            success: true,
            action,
            payload,
            message: None,
        }
    }

    pub fn failed(action: ActionKind, payload: ActionPayload, message: &str) -> Self {
        Self {
            success: false,
            action,
            payload,
            message: Some(message.to_string()),
        }
    }
}

/// Everything a handler needs besides the request itself.
#[derive(Clone, Copy)]
pub struct HandlerContext<'a> {
    pub conn: &'a Connection,
    /// Reference date for resolving date hints.
    pub today: NaiveDate,
    pub slot_minutes: u32,
    pub history_limit: usize,
}

impl<'a> HandlerContext<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            today: chrono::Utc::now().date_naive(),
            slot_minutes: DEFAULT_SLOT_MINUTES,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn from_settings(conn: &'a Connection, settings: &Settings) -> Self {
        Self {
            slot_minutes: settings.slot_minutes,
            history_limit: settings.history_limit,
            ..Self::new(conn)
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }
}

/// Run exactly the handler named by `intent`.
pub fn dispatch(
    ctx: &HandlerContext<'_>,
    intent: &Intent,
    message: &str,
) -> Result<ActionOutcome, DatabaseError> {
    match intent {
        Intent::BookAppointment(req) => handle_booking(ctx, req),
        Intent::UpdateRecords(req) => handle_record_update(ctx, req, message),
        Intent::RetrieveHistory(req) => handle_history(ctx, req),
        Intent::MedicalInfo(req) => Ok(handle_medical_info(req)),
        Intent::General(req) => Ok(handle_general(req)),
    }
}

/// Trimmed patient name, or the generic placeholder.
fn patient_or_default(name: Option<&str>) -> String {
    name.map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_PATIENT_NAME)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{count_appointments, insert_practitioner};
    use crate::db::sqlite::open_memory_database;
    use crate::pipeline::{PatientRequest, TopicRequest};

    #[test]
    fn dispatch_runs_only_the_named_handler() {
        let conn = open_memory_database().unwrap();
        insert_practitioner(&conn, "Dr. Smith", None).unwrap();
        let ctx = HandlerContext::new(&conn);

        let outcome = dispatch(
            &ctx,
            &Intent::General(TopicRequest::default()),
            "hello there",
        )
        .unwrap();
        assert_eq!(outcome.action, IntentKind::General);
        assert!(outcome.success);
        assert_eq!(count_appointments(&conn).unwrap(), 0);

        let outcome = dispatch(
            &ctx,
            &Intent::UpdateRecords(PatientRequest {
                patient_name: Some("Anjali".into()),
            }),
            "Allergic to penicillin",
        )
        .unwrap();
        assert_eq!(outcome.action, IntentKind::UpdateRecords);
        assert_eq!(count_appointments(&conn).unwrap(), 0);
    }

    #[test]
    fn patient_name_defaults() {
        assert_eq!(patient_or_default(None), "Patient");
        assert_eq!(patient_or_default(Some("  ")), "Patient");
        assert_eq!(patient_or_default(Some(" Ravi ")), "Ravi");
    }

    #[test]
    fn outcome_serializes_with_kind_tag() {
        let outcome = ActionOutcome::failed(
            IntentKind::RetrieveHistory,
            ActionPayload::NoRecords {
                patient: "Ramesh".into(),
            },
            MSG_NO_RECORDS,
        );
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["action"], "retrieve_history");
        assert_eq!(json["payload"]["kind"], "no_records");
        assert_eq!(json["message"], "no records found");
    }

    #[test]
    fn context_uses_configured_limits() {
        let conn = open_memory_database().unwrap();
        let settings = Settings {
            slot_minutes: 15,
            history_limit: 5,
            ..Settings::default()
        };
        let ctx = HandlerContext::from_settings(&conn, &settings);
        assert_eq!(ctx.slot_minutes, 15);
        assert_eq!(ctx.history_limit, 5);
    }
}
