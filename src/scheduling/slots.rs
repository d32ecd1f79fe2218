use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{repository, DatabaseError};

/// Clinic hours `[start_hour, end_hour)` on a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl TimeWindow {
    pub const MORNING: Self = Self::new(9, 12);
    pub const AFTERNOON: Self = Self::new(12, 17);
    pub const EVENING: Self = Self::new(17, 20);
    pub const BUSINESS_HOURS: Self = Self::new(9, 17);

    pub const fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    pub fn as_hours(&self) -> (u32, u32) {
        (self.start_hour, self.end_hour)
    }

    /// Absolute `[start, end)` of this window on `day`; `None` for an empty or invalid window.
    pub fn on(&self, day: NaiveDate) -> Option<(NaiveDateTime, NaiveDateTime)> {
        if self.start_hour >= self.end_hour || self.end_hour > 24 {
            return None;
        }
        let midnight = day.and_hms_opt(0, 0, 0)?;
        Some((
            midnight + Duration::hours(self.start_hour as i64),
            midnight + Duration::hours(self.end_hour as i64),
        ))
    }
}

/// Half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Interval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Interval {
    /// `None` unless `start < end`.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// Standard half-open intersection; touching endpoints do not overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && self.end > other.start
    }
}

/// Slot-aligned candidates for `window` on `day`, earliest first.
pub fn candidate_grid(day: NaiveDate, window: TimeWindow, slot_minutes: u32) -> Vec<Interval> {
    let Some((window_start, window_end)) = window.on(day) else {
        return Vec::new();
    };
    if slot_minutes == 0 {
        return Vec::new();
    }

    let step = Duration::minutes(slot_minutes as i64);
    let mut grid = Vec::new();
    let mut cursor = window_start;
    while cursor + step <= window_end {
        grid.push(Interval {
            start: cursor,
            end: cursor + step,
        });
        cursor += step;
    }
    grid
}

/// Keep the candidates that intersect none of `booked`, preserving order.
pub fn available_among(candidates: &[Interval], booked: &[Interval]) -> Vec<Interval> {
    candidates
        .iter()
        .filter(|c| !booked.iter().any(|b| c.overlaps(b)))
        .copied()
        .collect()
}

/// Free grid slots for a practitioner on `day` inside `window`.
///
/// An empty result (fully booked day, empty window) is a normal outcome.
pub fn find_available_slots(
    conn: &Connection,
    doctor_id: &Uuid,
    day: NaiveDate,
    window: TimeWindow,
    slot_minutes: u32,
) -> Result<Vec<Interval>, DatabaseError> {
    let candidates = candidate_grid(day, window, slot_minutes);
    if candidates.is_empty() {
        return Ok(candidates);
    }

    let booked: Vec<Interval> = repository::booked_intervals_on(conn, doctor_id, day)?
        .into_iter()
        .map(|(start, end)| Interval { start, end })
        .collect();

    let available = available_among(&candidates, &booked);
    tracing::debug!(
        %doctor_id,
        %day,
        candidates = candidates.len(),
        booked = booked.len(),
        available = available.len(),
        "Computed available slots"
    );
    Ok(available)
}
