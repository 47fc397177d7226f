use std::fmt;

use chrono::NaiveDate;

use crate::PeriodError;

/// A maximal run of consecutive calendar days, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    /// Number of days covered.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// The day after the last day of the period.
    pub fn return_date(&self) -> Result<NaiveDate, PeriodError> {
        self.end
            .succ_opt()
            .ok_or(PeriodError::DateOutOfRange(self.end))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Partition `dates` into maximal runs of consecutive days, ordered by start.
///
/// Duplicates are ignored and input order does not matter. A gap of two or more days closes the
/// current run.
pub fn consecutive_periods(dates: impl IntoIterator<Item = NaiveDate>) -> Vec<Period> {
    let mut dates: Vec<NaiveDate> = dates.into_iter().collect();
    dates.sort_unstable();
    dates.dedup();

    let mut periods = Vec::new();
    let mut days = dates.into_iter();
    let Some(first) = days.next() else {
        return periods;
    };
    let mut current = Period::single(first);
    for day in days {
        if current.end.succ_opt() == Some(day) {
            current.end = day;
        } else {
            periods.push(current);
            current = Period::single(day);
        }
    }
    periods.push(current);
    periods
}

/// Which day closes a printed period label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LabelPolicy {
    /// The last day of attendance.
    #[default]
    LastDay,
    /// The day after the last day of attendance (return to base).
    ReturnDay,
}

impl LabelPolicy {
    pub fn label_end(self, period: &Period) -> Result<NaiveDate, PeriodError> {
        match self {
            LabelPolicy::LastDay => Ok(period.end),
            LabelPolicy::ReturnDay => period.return_date(),
        }
    }
}

/// `DD/MM a DD/MM/YYYY`, e.g. `03/10 a 06/10/2025`.
pub fn format_label(period: &Period, policy: LabelPolicy) -> Result<String, PeriodError> {
    let end = policy.label_end(period)?;
    Ok(format!(
        "{} a {}",
        period.start.format("%d/%m"),
        end.format("%d/%m/%Y")
    ))
}
