//! Attendance periods: turning (person, day) facts into maximal runs of consecutive days,
//! grouping people by the printed period, and laying the groups out as report rows.

mod error;
mod period;
mod record;
mod report;
mod source;

pub use error::{PeriodError, SourceError};
pub use period::{consecutive_periods, format_label, LabelPolicy, Period};
pub use record::{parse_activity_date, AttendanceRecord, ATTENDING_STATUSES};
pub use report::{
    aggregate, group_by_label, to_rows, LabeledEntry, Member, PeriodGroup, ReportRow,
    BANNER_PREFIX, HEADER_LABELS, REPORT_WIDTH,
};
pub use source::{decode_records, AttendanceSource};
