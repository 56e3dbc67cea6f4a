//! Date handling for acquisition timestamps and query ranges.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Calendar date format used in queries and output file names.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse an ISO 8601 timestamp as found in catalog records.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    // Try full datetime with timezone
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Try without timezone (assume UTC), with and without fractional seconds
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    // Try date only
    if let Ok(date) = NaiveDate::parse_from_str(s, DATE_FORMAT) {
        return Ok(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default()));
    }

    Err(TimeParseError::InvalidFormat(s.to_string()))
}

/// The calendar day an acquisition belongs to, ignoring time of day.
pub fn solar_day(dt: &DateTime<Utc>) -> NaiveDate {
    dt.date_naive()
}

/// An inclusive range of calendar dates for catalog queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, TimeParseError> {
        if start > end {
            return Err(TimeParseError::InvertedRange {
                start: start.format(DATE_FORMAT).to_string(),
                end: end.format(DATE_FORMAT).to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parse "YYYY-MM-DD/YYYY-MM-DD".
    pub fn parse(s: &str) -> Result<Self, TimeParseError> {
        let (start, end) = s
            .split_once('/')
            .ok_or_else(|| TimeParseError::InvalidFormat(s.to_string()))?;
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    /// The `time` parameter value for catalog searches.
    pub fn to_query_string(&self) -> String {
        format!(
            "{}/{}",
            self.start.format(DATE_FORMAT),
            self.end.format(DATE_FORMAT)
        )
    }

    pub fn contains(&self, date: &NaiveDate) -> bool {
        date >= &self.start && date <= &self.end
    }
}

/// Parse a single "YYYY-MM-DD" date.
pub fn parse_date(s: &str) -> Result<NaiveDate, TimeParseError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|_| TimeParseError::InvalidFormat(s.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),

    #[error("Start date {start} is after end date {end}")]
    InvertedRange { start: String, end: String },
}
