use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

static FILE_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})[-_]?(\d{2})[-_]?(\d{2})").expect("static regex"));

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Cleaned cell, or `None` when nothing is left.
pub fn non_empty(raw: &str) -> Option<String> {
    let c = clean_str(raw);
    if c.is_empty() {
        None
    } else {
        Some(c)
    }
}

/// Extracts the run date from a file name carrying `YYYYMMDD`, `YYYY-MM-DD`
/// or `YYYY_MM_DD`, e.g. `processed_auctions_20240110.csv`.
pub fn extract_date_from_filename(filename: &str) -> Option<NaiveDate> {
    FILE_DATE.captures_iter(filename).find_map(|c| {
        let y = c[1].parse().ok()?;
        let m = c[2].parse().ok()?;
        let d = c[3].parse().ok()?;
        NaiveDate::from_ymd_opt(y, m, d)
    })
}
