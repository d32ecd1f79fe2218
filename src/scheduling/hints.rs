use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

use super::slots::TimeWindow;

const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

/// Resolve a free-form date hint relative to `today`. Never fails.
///
/// - empty / absent → tomorrow
/// - `today`, `tomorrow`
/// - contains a weekday name → next occurrence strictly after today
///   (a Monday hint on a Monday is one week out)
/// - ISO date (or ISO date-time) → that date
/// - anything else → tomorrow
pub fn parse_date_hint(hint: Option<&str>, today: NaiveDate) -> NaiveDate {
    let tomorrow = today + Duration::days(1);
    let raw = match hint.map(str::trim) {
        Some(h) if !h.is_empty() => h,
        _ => return tomorrow,
    };
    let lower = raw.to_lowercase();

    match lower.as_str() {
        "today" => return today,
        "tomorrow" => return tomorrow,
        _ => {}
    }

    if let Some(target) = WEEKDAYS.iter().position(|wd| lower.contains(wd)) {
        let current = today.weekday().num_days_from_monday() as i64;
        let mut days_ahead = (target as i64 - current).rem_euclid(7);
        if days_ahead == 0 {
            days_ahead = 7;
        }
        return today + Duration::days(days_ahead);
    }

    parse_iso_date(raw).unwrap_or_else(|| {
        tracing::debug!(hint = raw, "Unparseable date hint, defaulting to tomorrow");
        tomorrow
    })
}

fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.date())
}

/// Map a free-form time-of-day hint to an hour window by substring. Never fails.
pub fn pick_time_window(hint: Option<&str>) -> TimeWindow {
    let lower = match hint {
        Some(h) if !h.trim().is_empty() => h.to_lowercase(),
        _ => return TimeWindow::BUSINESS_HOURS,
    };

    if lower.contains("morning") {
        TimeWindow::MORNING
    } else if lower.contains("afternoon") {
        TimeWindow::AFTERNOON
    } else if lower.contains("evening") {
        TimeWindow::EVENING
    } else {
        TimeWindow::BUSINESS_HOURS
    }
}
