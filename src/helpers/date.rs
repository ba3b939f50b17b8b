//! Date helper functions

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate};
use thiserror::Error;

/// Shown wherever a post has no publication date
pub const MISSING_DATE_PLACEHOLDER: &str = "Não publicado";

/// Abbreviated month names, pt-BR
const MONTHS_PT_BR: [&str; 12] = [
    "jan", "fev", "mar", "abr", "mai", "jun", "jul", "ago", "set", "out", "nov", "dez",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateError {
    #[error("unrecognized timestamp: {0:?}")]
    Unrecognized(String),
}

/// Parse a content API timestamp, keeping its own offset
///
/// Accepts RFC 3339 (`2021-03-15T00:00:00Z`), the API's compact offset form
/// (`2021-03-15T19:25:28+0000`) and bare dates (`2021-03-15`).
pub fn parse_timestamp(timestamp: &str) -> Result<NaiveDate, DateError> {
    let timestamp = timestamp.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp) {
        return Ok(dt.date_naive());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::<FixedOffset>::parse_from_str(timestamp, format) {
            return Ok(dt.date_naive());
        }
    }

    NaiveDate::parse_from_str(timestamp, "%Y-%m-%d")
        .map_err(|_| DateError::Unrecognized(timestamp.to_string()))
}

/// Format a timestamp as `dd mmm yyyy` with pt-BR month names
///
/// # Examples
/// ```ignore
/// format_date("2021-03-15T00:00:00Z") // -> Ok("15 mar 2021")
/// ```
pub fn format_date(timestamp: &str) -> Result<String, DateError> {
    let date = parse_timestamp(timestamp)?;
    Ok(format!(
        "{:02} {} {:04}",
        date.day(),
        MONTHS_PT_BR[date.month0() as usize],
        date.year()
    ))
}

/// Format an optional timestamp, falling back to the placeholder
pub fn display_date(timestamp: Option<&str>) -> String {
    match timestamp.map(format_date) {
        Some(Ok(formatted)) => formatted,
        Some(Err(e)) => {
            tracing::warn!("Cannot format date: {}", e);
            MISSING_DATE_PLACEHOLDER.to_string()
        }
        None => MISSING_DATE_PLACEHOLDER.to_string(),
    }
}

/// Machine-readable date for `<time datetime="...">`
pub fn date_xml(timestamp: Option<&str>) -> String {
    timestamp
        .and_then(|ts| parse_timestamp(ts).ok())
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}
