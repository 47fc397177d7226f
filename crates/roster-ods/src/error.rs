use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Which grid axis an index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Row,
    Column,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Axis::Row => "row",
            Axis::Column => "column",
        })
    }
}

#[derive(Debug, Error)]
pub enum OdsError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("malformed document part {part}: {message}")]
    Malformed { part: String, message: String },
    #[error("spreadsheet structure not found: missing {0}")]
    StructureNotFound(&'static str),
    #[error("invalid {axis} index {index}: indices start at 1")]
    InvalidIndex { axis: Axis, index: u32 },
    #[error(
        "cell text has U+{:04X} at character {position}, which XML 1.0 cannot carry",
        u32::from(*character)
    )]
    InvalidText { character: char, position: usize },
    #[error(
        "document part is too large to load safely: {part} is {size} bytes (max {max} bytes)"
    )]
    PartTooLarge { part: String, size: u64, max: u64 },
    #[error("{part} failed its check before save: {message}")]
    Verification { part: String, message: String },
    #[error("failed to back up {}: {source}", path.display())]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl OdsError {
    pub(crate) fn malformed(part: &str, message: impl Into<String>) -> Self {
        Self::Malformed {
            part: part.to_string(),
            message: message.into(),
        }
    }
}
