//! Demonstration data: practitioners, imported sample reports and one
//! starter appointment. Every step is skipped when its data already exists.

use std::path::Path;
use std::sync::LazyLock;

use chrono::{Duration, NaiveDate};
use regex::Regex;
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;

use crate::db::{repository, DatabaseError};
use crate::knowledge::{list_source_files, KnowledgeError};
use crate::models::{NewPatient, RECORD_TYPE_IMPORTED};
use crate::scheduling::{commit_booking, SchedulingError};

pub const DEMO_PRACTITIONERS: [(&str, &str); 4] = [
    ("Dr. Smith", "Cardiology"),
    ("Dr. Patel", "Dermatology"),
    ("Dr. Chen", "General Medicine"),
    ("Dr. Rao", "Endocrinology"),
];

/// Imported report text is capped at this many characters.
pub const REPORT_CHAR_LIMIT: usize = 8_000;
pub const STARTER_REASON: &str = "Routine checkup";
const STARTER_HOUR: u32 = 10;
const STARTER_MINUTES: i64 = 30;

static SAMPLE_REPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)sample_report[_-]([a-z]+)").unwrap());

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Scheduling error: {0}")]
    Scheduling(#[from] SchedulingError),

    #[error(transparent)]
    Sources(#[from] KnowledgeError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub practitioners_added: usize,
    pub reports_imported: usize,
    pub appointment_booked: bool,
}

pub fn seed_demo_data(
    conn: &Connection,
    sources_dir: &Path,
    today: NaiveDate,
) -> Result<SeedReport, SeedError> {
    let _span = tracing::info_span!("seed_demo_data").entered();

    let report = SeedReport {
        practitioners_added: seed_practitioners(conn)?,
        reports_imported: import_sample_reports(conn, sources_dir)?,
        appointment_booked: book_starter_appointment(conn, today)?,
    };
    tracing::info!(
        practitioners = report.practitioners_added,
        reports = report.reports_imported,
        appointment = report.appointment_booked,
        "Demo data seeded"
    );
    Ok(report)
}

fn seed_practitioners(conn: &Connection) -> Result<usize, DatabaseError> {
    if repository::count_practitioners(conn)? > 0 {
        return Ok(0);
    }
    for (name, specialty) in DEMO_PRACTITIONERS {
        repository::insert_practitioner(conn, name, Some(specialty))?;
    }
    Ok(DEMO_PRACTITIONERS.len())
}

/// Patient name encoded in a `sample_report_<name>` file name, capitalised.
pub fn sample_report_patient(file_name: &str) -> Option<String> {
    let raw = SAMPLE_REPORT.captures(file_name)?.get(1)?.as_str();
    let mut chars = raw.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect())
}

fn import_sample_reports(conn: &Connection, sources_dir: &Path) -> Result<usize, SeedError> {
    let mut imported = 0;
    for path in list_source_files(sources_dir)? {
        let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let Some(patient) = sample_report_patient(&file_name) else {
            continue;
        };

        repository::upsert_patient(conn, &NewPatient::named(&patient))?;
        if repository::has_record_from_source(conn, &patient, &file_name)? {
            tracing::debug!(%file_name, "Sample report already imported");
            continue;
        }

        let text = std::fs::read_to_string(&path).map_err(|source| KnowledgeError::Io {
            path: path.clone(),
            source,
        })?;
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let content: String = text.chars().take(REPORT_CHAR_LIMIT).collect();
        repository::insert_record(conn, &patient, RECORD_TYPE_IMPORTED, &content, &file_name)?;
        tracing::info!(%patient, %file_name, "Imported sample report");
        imported += 1;
    }
    Ok(imported)
}

fn book_starter_appointment(conn: &Connection, today: NaiveDate) -> Result<bool, SeedError> {
    if repository::count_appointments(conn)? > 0 {
        return Ok(false);
    }
    let Some(doctor) = repository::find_practitioners(conn, None)?.into_iter().next() else {
        return Ok(false);
    };
    let Some(patient) = repository::first_registered_patient(conn)? else {
        return Ok(false);
    };

    let tomorrow = today + Duration::days(1);
    let Some(start) = tomorrow.and_hms_opt(STARTER_HOUR, 0, 0) else {
        return Ok(false);
    };
    let end = start + Duration::minutes(STARTER_MINUTES);
    commit_booking(conn, &patient.name, &doctor.id, start, end, STARTER_REASON)?;
    Ok(true)
}
