//! Duty-roster editing on top of `roster-ods` and `roster-periods`.
//!
//! Each operation runs to completion on one document: open it, take a backup, mutate the grid,
//! check the serialized `content.xml`, save atomically, then re-read the saved file. A failure
//! before the rename leaves the document untouched; a failure after it leaves the backup in
//! place.

pub mod cli;
mod source;
pub mod verify;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use roster_ods::{
    backup, check_cell_text, compare_files, Axis, BackupNaming, OdsDocument, OdsError, RowSpec,
};
use roster_periods::{aggregate, to_rows, AttendanceSource, LabelPolicy, ReportRow};

pub use source::JsonFileSource;

#[derive(Debug, Clone)]
pub struct WriteCellOptions {
    pub path: PathBuf,
    pub row: u32,
    pub column: u32,
    pub text: String,
    /// `None` skips the backup.
    pub backup: Option<BackupNaming>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteCellOutcome {
    pub backup: Option<PathBuf>,
    pub previous: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InsertReportOptions {
    pub path: PathBuf,
    /// 1-based row at which the first report row lands.
    pub start_row: u32,
    pub label_policy: LabelPolicy,
    pub backup: Option<BackupNaming>,
    /// Compute the rows without touching the document.
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertReportOutcome {
    pub rows: Vec<ReportRow>,
    pub groups: usize,
    pub backup: Option<PathBuf>,
    /// `false` for a dry run.
    pub saved: bool,
}

/// The grid row a report row is written as.
pub fn row_spec(row: &ReportRow) -> RowSpec {
    match row {
        ReportRow::Banner { text, span } => RowSpec::Merged {
            text: text.clone(),
            span: *span,
        },
        other => RowSpec::Cells(other.cells()),
    }
}

fn check_index(axis: Axis, index: u32) -> Result<()> {
    if index == 0 {
        return Err(OdsError::InvalidIndex { axis, index }.into());
    }
    Ok(())
}

fn take_backup(path: &Path, naming: Option<BackupNaming>) -> Result<Option<PathBuf>> {
    let Some(naming) = naming else {
        log::warn!("no backup taken for {}", path.display());
        return Ok(None);
    };
    let backup_path = backup(path, naming)?;
    Ok(Some(backup_path))
}

/// The saved file may differ from its backup in `content.xml` only.
fn check_package(backup: Option<&Path>, path: &Path) -> Result<()> {
    let Some(backup) = backup else {
        return Ok(());
    };
    let diff = compare_files(backup, path)
        .with_context(|| format!("compare {} with its backup", path.display()))?;
    if !diff.only_changed(&[roster_ods::ns::CONTENT_PART]) {
        bail!(
            "saved package differs from backup {} beyond content.xml:\n{diff}",
            backup.display()
        );
    }
    Ok(())
}

/// Runs `check` on an independent parse of the serialized `content.xml`, for
/// [`OdsDocument::save_checked`].
fn check_before_save(
    check: impl FnOnce(&verify::GridSnapshot) -> Result<()>,
) -> impl FnOnce(&[u8]) -> Result<(), OdsError> {
    move |content| {
        verify::snapshot_content(content)
            .and_then(|snapshot| check(&snapshot))
            .map_err(|err| OdsError::Verification {
                part: roster_ods::ns::CONTENT_PART.to_string(),
                message: format!("{err:#}"),
            })
    }
}

fn expect_cell(
    snapshot: &verify::GridSnapshot,
    row: u32,
    column: u32,
    expected: &str,
) -> Result<()> {
    let found = verify::cell(snapshot, row, column);
    if found != Some(expected) {
        bail!("row {row} column {column} reads {found:?}, expected {expected:?}");
    }
    Ok(())
}

/// Text of one cell; `None` when the cell is out of range or has no paragraph.
pub fn read_cell(path: &Path, row: u32, column: u32) -> Result<Option<String>> {
    let doc = OdsDocument::open(path).with_context(|| format!("open {}", path.display()))?;
    let table = doc.grid().locate_table()?;
    Ok(doc.grid().read_cell(table, row, column))
}

/// Overwrite one cell, padding rows and columns as needed.
pub fn write_cell(options: &WriteCellOptions) -> Result<WriteCellOutcome> {
    let path = options.path.as_path();
    check_index(Axis::Row, options.row)?;
    check_index(Axis::Column, options.column)?;
    check_cell_text(&options.text)?;

    let mut doc = OdsDocument::open(path).with_context(|| format!("open {}", path.display()))?;
    let table = doc.grid().locate_table()?;
    let backup = take_backup(path, options.backup)?;

    let previous = doc.grid().read_cell(table, options.row, options.column);
    doc.grid_mut()
        .write_cell(table, options.row, options.column, &options.text)?;
    let (row, column, text) = (options.row, options.column, options.text.as_str());
    doc.save_checked(check_before_save(|snapshot| {
        expect_cell(snapshot, row, column, text)
    }))
    .with_context(|| format!("save {}", path.display()))?;

    if !verify_cell(path, options.row, options.column, &options.text)? {
        bail!(
            "cell {}/{} of {} does not read back as written",
            options.row,
            options.column,
            path.display()
        );
    }
    check_package(backup.as_deref(), path)?;

    log::info!(
        "wrote {:?} to row {} column {} of {}",
        options.text,
        options.row,
        options.column,
        path.display()
    );
    Ok(WriteCellOutcome { backup, previous })
}

/// Aggregate the source's records into period groups and insert them as rows starting at
/// `start_row`.
///
/// An empty report is an error and leaves the document (and the backup directory) untouched.
pub fn insert_report(
    options: &InsertReportOptions,
    source: &dyn AttendanceSource,
) -> Result<InsertReportOutcome> {
    let path = options.path.as_path();
    check_index(Axis::Row, options.start_row)?;

    let records = source.records().context("load attendance records")?;
    let groups = aggregate(&records, options.label_policy)?;
    let rows = to_rows(&groups);
    if rows.is_empty() {
        bail!("no attendance periods to insert into {}", path.display());
    }
    log::info!(
        "{} records form {} period groups ({} rows)",
        records.len(),
        groups.len(),
        rows.len()
    );

    let specs: Vec<RowSpec> = rows.iter().map(row_spec).collect();
    for spec in &specs {
        spec.validate()?;
    }

    if options.dry_run {
        return Ok(InsertReportOutcome {
            rows,
            groups: groups.len(),
            backup: None,
            saved: false,
        });
    }

    let mut doc = OdsDocument::open(path).with_context(|| format!("open {}", path.display()))?;
    let table = doc.grid().locate_table()?;
    let backup = take_backup(path, options.backup)?;

    doc.grid_mut()
        .insert_rows(table, options.start_row, &specs)?;
    doc.save_checked(check_before_save(|snapshot| {
        check_rows(snapshot, options.start_row, &rows)
    }))
    .with_context(|| format!("save {}", path.display()))?;

    let saved = verify::snapshot(path)?;
    check_rows(&saved, options.start_row, &rows)
        .with_context(|| format!("verify {}", path.display()))?;
    log::debug!("verified {} inserted rows", rows.len());
    check_package(backup.as_deref(), path)?;

    Ok(InsertReportOutcome {
        rows,
        groups: groups.len(),
        backup,
        saved: true,
    })
}

/// Whether the saved cell at (`row`, `column`) reads `expected`.
pub fn verify_cell(path: &Path, row: u32, column: u32, expected: &str) -> Result<bool> {
    let snapshot = verify::snapshot(path)?;
    Ok(verify::cell(&snapshot, row, column) == Some(expected))
}

fn check_rows(
    snapshot: &verify::GridSnapshot,
    start_row: u32,
    rows: &[ReportRow],
) -> Result<()> {
    for (offset, row) in (0u32..).zip(rows) {
        let row_index = start_row.saturating_add(offset);
        let cells = row.cells();
        // A banner's covered columns have no paragraph of their own.
        let checked = match row {
            ReportRow::Banner { .. } => &cells[..1],
            _ => &cells[..],
        };
        for (column, expected) in (1u32..).zip(checked) {
            expect_cell(snapshot, row_index, column, expected)?;
        }
    }
    Ok(())
}
