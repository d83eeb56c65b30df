use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::process::utils::clean_str;

/// Date-only layouts, tried in order. Numeric day/month layouts are read
/// day-first: the exports come from an Indian regulator. This knowingly
/// differs from pandas' month-first `to_datetime` default.
pub const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%d-%b-%Y",
    "%d-%B-%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

/// Layouts carrying a time of day; the time is dropped.
pub const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %I:%M %p",
    "%d/%m/%Y %I:%M %p",
    "%d-%b-%Y %H:%M:%S",
];

/// Lenient parse of one cell into a calendar date.
///
/// Returns `None` for empty cells and anything no layout accepts; never errors.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = clean_str(raw);
    if s.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(&s, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(&s, f).ok())
                .map(|dt| dt.date())
        })
        // offset-carrying stamps keep their own calendar date, no conversion
        .or_else(|| {
            DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|dt| dt.date_naive())
        })
}
