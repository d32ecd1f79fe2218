//! Repository layer: entity-scoped database operations.
//!
//! One sub-module per table family. All public functions are re-exported here.

mod appointment;
mod knowledge;
mod patient;
mod practitioner;
mod record;

use chrono::NaiveDateTime;
use rusqlite::types::Type;
use uuid::Uuid;

use crate::models::TIMESTAMP_FORMAT;

pub use appointment::*;
pub use knowledge::*;
pub use patient::*;
pub use practitioner::*;
pub use record::*;

/// Read a UUID stored as text.
fn uuid_column(row: &rusqlite::Row, idx: usize) -> Result<Uuid, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read a `TIMESTAMP_FORMAT` timestamp stored as text.
fn timestamp_column(row: &rusqlite::Row, idx: usize) -> Result<NaiveDateTime, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read a `str_enum!` value stored as text.
fn enum_column<T>(row: &rusqlite::Row, idx: usize) -> Result<T, rusqlite::Error>
where
    T: std::str::FromStr<Err = crate::db::DatabaseError>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
