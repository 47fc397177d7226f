use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PeriodError {
    #[error("invalid activity date {value:?}: expected YYYY-MM-DD or an ISO 8601 date-time")]
    InvalidDate { value: String },
    #[error("no calendar day after {0}")]
    DateOutOfRange(NaiveDate),
}

/// Failure of an [`crate::AttendanceSource`] to produce records.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read attendance records from {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid attendance records in {origin}: {source}")]
    Decode {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid attendance records in {origin}: {message}")]
    Shape { origin: String, message: String },
}
