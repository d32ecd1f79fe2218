pub mod appointment;
pub mod enums;
pub mod knowledge;
pub mod patient;
pub mod practitioner;
pub mod record;

pub use appointment::*;
pub use enums::*;
pub use knowledge::*;
pub use patient::*;
pub use practitioner::*;
pub use record::*;

use chrono::NaiveDateTime;

use crate::db::DatabaseError;

/// Storage format for every timestamp: ISO-8601, second precision, no offset.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map_err(|_| DatabaseError::InvalidTimestamp(raw.to_string()))
}

/// Current UTC time truncated to whole seconds.
pub fn now_utc() -> NaiveDateTime {
    use chrono::Timelike;
    let now = chrono::Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}
