use std::fs;
use std::path::PathBuf;

use roster_periods::{decode_records, AttendanceRecord, AttendanceSource, SourceError};

/// Attendance records from a JSON file (an array, or an object with `records` or
/// `participacoes`).
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    pub path: PathBuf,
    /// Drop records that are inactive or whose status is not an attending one.
    pub attending_only: bool,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            attending_only: true,
        }
    }
}

impl AttendanceSource for JsonFileSource {
    fn records(&self) -> Result<Vec<AttendanceRecord>, SourceError> {
        let bytes = fs::read(&self.path).map_err(|source| SourceError::Read {
            path: self.path.clone(),
            source,
        })?;
        let mut records = decode_records(&bytes, &self.path.display().to_string())?;
        let total = records.len();
        if self.attending_only {
            records.retain(AttendanceRecord::is_attending);
        }
        log::info!(
            "loaded {} attendance records from {} ({} filtered out)",
            records.len(),
            self.path.display(),
            total - records.len()
        );
        Ok(records)
    }
}
