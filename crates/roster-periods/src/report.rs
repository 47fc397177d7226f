//! Grouping entities by period label and laying the groups out as spreadsheet rows.

use std::collections::{BTreeMap, HashMap};

use crate::period::{consecutive_periods, format_label, LabelPolicy};
use crate::{AttendanceRecord, PeriodError};

/// Number of columns every report row spans.
pub const REPORT_WIDTH: usize = 6;

pub const HEADER_LABELS: [&str; REPORT_WIDTH] =
    ["Servidor", "Matrícula", "Nº Viagem", "Conc?", "Rev?", "Obs."];

pub const BANNER_PREFIX: &str = "Período: ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub code: String,
}

/// One entity's period, already formatted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledEntry {
    pub name: String,
    pub code: String,
    pub label: String,
}

/// Entities sharing one printed period label, sorted by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodGroup {
    pub label: String,
    pub members: Vec<Member>,
}

/// Group entries by label. Groups come out in lexical label order; within a group members are
/// sorted by name, keeping input order among equal names.
///
/// Grouping is by the printed label, not the underlying dates, and lexical label order is only
/// chronological among labels of the same month and year.
pub fn group_by_label(entries: impl IntoIterator<Item = LabeledEntry>) -> Vec<PeriodGroup> {
    let mut by_label: BTreeMap<String, Vec<Member>> = BTreeMap::new();
    for entry in entries {
        by_label.entry(entry.label).or_default().push(Member {
            name: entry.name,
            code: entry.code,
        });
    }
    by_label
        .into_iter()
        .map(|(label, mut members)| {
            members.sort_by(|a, b| a.name.cmp(&b.name));
            PeriodGroup { label, members }
        })
        .collect()
}

/// Compute every entity's periods from its records and group them by label.
///
/// Entities are keyed by `entity_id`; the name and code of an entity's first record are used.
pub fn aggregate(
    records: &[AttendanceRecord],
    policy: LabelPolicy,
) -> Result<Vec<PeriodGroup>, PeriodError> {
    let mut order: Vec<&str> = Vec::new();
    let mut dates_by_entity: HashMap<&str, (&AttendanceRecord, Vec<chrono::NaiveDate>)> =
        HashMap::new();
    for record in records {
        dates_by_entity
            .entry(record.entity_id.as_str())
            .or_insert_with(|| {
                order.push(record.entity_id.as_str());
                (record, Vec::new())
            })
            .1
            .push(record.activity_date);
    }

    let mut entries = Vec::new();
    let mut period_count = 0usize;
    for id in order {
        let Some((first, dates)) = dates_by_entity.remove(id) else {
            continue;
        };
        for period in consecutive_periods(dates) {
            period_count += 1;
            entries.push(LabeledEntry {
                name: first.entity_name.clone(),
                code: first.entity_code.clone(),
                label: format_label(&period, policy)?,
            });
        }
    }

    let groups = group_by_label(entries);
    log::debug!(
        "aggregated {} records into {period_count} periods and {} groups",
        records.len(),
        groups.len()
    );
    Ok(groups)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportRow {
    /// Merged row announcing a period.
    Banner { text: String, span: u32 },
    Header,
    Data([String; REPORT_WIDTH]),
    Blank,
}

impl ReportRow {
    pub fn banner(label: &str) -> Self {
        ReportRow::Banner {
            text: format!("{BANNER_PREFIX}{label}"),
            span: REPORT_WIDTH as u32,
        }
    }

    pub fn data(member: &Member) -> Self {
        let mut cells: [String; REPORT_WIDTH] = Default::default();
        cells[0] = member.name.clone();
        cells[1] = member.code.clone();
        ReportRow::Data(cells)
    }

    /// Texts of the row's cells, left to right. A banner yields its text followed by the
    /// columns it covers, as empty strings.
    pub fn cells(&self) -> Vec<String> {
        match self {
            ReportRow::Banner { text, span } => {
                let mut cells = vec![String::new(); (*span).max(1) as usize];
                cells[0] = text.clone();
                cells
            }
            ReportRow::Header => HEADER_LABELS.iter().map(|s| s.to_string()).collect(),
            ReportRow::Data(cells) => cells.to_vec(),
            ReportRow::Blank => vec![String::new(); REPORT_WIDTH],
        }
    }
}

/// Lay out groups as banner, header, one row per member and a blank separator, group after
/// group. The last group keeps its separator.
pub fn to_rows(groups: &[PeriodGroup]) -> Vec<ReportRow> {
    let mut rows = Vec::new();
    for group in groups {
        rows.push(ReportRow::banner(&group.label));
        rows.push(ReportRow::Header);
        rows.extend(group.members.iter().map(ReportRow::data));
        rows.push(ReportRow::Blank);
    }
    rows
}
