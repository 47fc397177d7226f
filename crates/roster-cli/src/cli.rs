use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use roster_ods::BackupNaming;
use roster_periods::{LabelPolicy, ReportRow};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::{InsertReportOptions, JsonFileSource, WriteCellOptions};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackupNamingArg {
    /// `<file>.backup`, replacing an earlier one.
    Plain,
    /// `<file>.backup_<YYYYMMDD_HHMMSS>`.
    Timestamped,
}

impl From<BackupNamingArg> for BackupNaming {
    fn from(arg: BackupNamingArg) -> Self {
        match arg {
            BackupNamingArg::Plain => BackupNaming::Plain,
            BackupNamingArg::Timestamped => BackupNaming::Timestamped,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LabelEndArg {
    /// Last day of attendance.
    LastDay,
    /// Day after the last day of attendance.
    ReturnDay,
}

impl From<LabelEndArg> for LabelPolicy {
    fn from(arg: LabelEndArg) -> Self {
        match arg {
            LabelEndArg::LastDay => LabelPolicy::LastDay,
            LabelEndArg::ReturnDay => LabelPolicy::ReturnDay,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "roster",
    about = "Edit cells of an ODS duty roster and insert attendance period reports into it."
)]
pub struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs)]
struct CellArgs {
    /// Spreadsheet (.ods) to operate on.
    #[arg(long, value_name = "PATH")]
    file: PathBuf,

    /// 1-based row number.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    row: u32,

    /// 1-based column number.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    column: u32,
}

#[derive(ClapArgs)]
struct BackupArgs {
    /// Do not copy the file before modifying it.
    #[arg(long)]
    no_backup: bool,

    #[arg(long, value_enum, default_value_t = BackupNamingArg::Timestamped)]
    backup_naming: BackupNamingArg,
}

impl BackupArgs {
    fn naming(&self) -> Option<BackupNaming> {
        (!self.no_backup).then(|| self.backup_naming.into())
    }
}

#[derive(Subcommand)]
enum Command {
    /// Print the text of one cell.
    ReadCell(CellArgs),

    /// Overwrite one cell, adding rows and columns as needed.
    WriteCell {
        #[command(flatten)]
        cell: CellArgs,

        /// New cell text.
        #[arg(long)]
        text: String,

        #[command(flatten)]
        backup: BackupArgs,
    },

    /// Insert attendance periods, grouped by period, as report rows.
    InsertReport {
        /// Spreadsheet (.ods) to operate on.
        #[arg(long, value_name = "PATH")]
        file: PathBuf,

        /// JSON attendance records (an array, or an object with `records`/`participacoes`).
        #[arg(long, value_name = "PATH")]
        records: PathBuf,

        /// 1-based row where the report starts.
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        start_row: u32,

        /// Which day closes a period label.
        #[arg(long, value_enum, default_value_t = LabelEndArg::LastDay)]
        label_end: LabelEndArg,

        /// Keep records regardless of their status/active flag.
        #[arg(long)]
        include_inactive: bool,

        #[command(flatten)]
        backup: BackupArgs,

        /// Print the rows without modifying the file.
        #[arg(long)]
        dry_run: bool,
    },

    /// Check that a saved cell reads the expected text (exit status 1 otherwise).
    Verify {
        #[command(flatten)]
        cell: CellArgs,

        /// Expected cell text.
        #[arg(long)]
        expect: String,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A second initialization (e.g. from tests) is not an error worth reporting.
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(filter)
        .try_init();
}

/// Write `lines` to stdout, stopping quietly if the reader went away.
fn emit(lines: impl IntoIterator<Item = String>) -> Result<()> {
    let mut out = io::stdout().lock();
    for line in lines {
        match writeln!(out, "{line}") {
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => return Ok(()),
            other => other.context("write to stdout")?,
        }
    }
    Ok(())
}

fn render_row(row: &ReportRow) -> String {
    match row {
        ReportRow::Banner { text, span } => format!("[{text}] (merged x{span})"),
        other => other.cells().join(" | "),
    }
}

pub fn run() -> Result<()> {
    init_logging();
    run_with_args(Args::parse())
}

pub fn run_with_args(args: Args) -> Result<()> {
    match args.command {
        Command::ReadCell(cell) => {
            let text = crate::read_cell(&cell.file, cell.row, cell.column)?;
            match text {
                Some(text) => emit([text]),
                None => {
                    log::info!("row {} column {} has no text", cell.row, cell.column);
                    Ok(())
                }
            }
        }
        Command::WriteCell { cell, text, backup } => {
            let outcome = crate::write_cell(&WriteCellOptions {
                path: cell.file.clone(),
                row: cell.row,
                column: cell.column,
                text,
                backup: backup.naming(),
            })?;
            let mut lines = Vec::new();
            if let Some(path) = &outcome.backup {
                lines.push(format!("backup: {}", path.display()));
            }
            lines.push(format!(
                "row {} column {}: {:?} -> saved {}",
                cell.row,
                cell.column,
                outcome.previous.unwrap_or_default(),
                cell.file.display()
            ));
            emit(lines)
        }
        Command::InsertReport {
            file,
            records,
            start_row,
            label_end,
            include_inactive,
            backup,
            dry_run,
        } => {
            let source = JsonFileSource {
                path: records,
                attending_only: !include_inactive,
            };
            let outcome = crate::insert_report(
                &InsertReportOptions {
                    path: file.clone(),
                    start_row,
                    label_policy: label_end.into(),
                    backup: backup.naming(),
                    dry_run,
                },
                &source,
            )?;

            let mut lines: Vec<String> = outcome.rows.iter().map(render_row).collect();
            if let Some(path) = &outcome.backup {
                lines.push(format!("backup: {}", path.display()));
            }
            lines.push(if outcome.saved {
                format!(
                    "inserted {} rows ({} periods) at row {start_row} of {}",
                    outcome.rows.len(),
                    outcome.groups,
                    file.display()
                )
            } else {
                format!("dry run: {} rows, {} not modified", outcome.rows.len(), file.display())
            });
            emit(lines)
        }
        Command::Verify { cell, expect } => {
            if crate::verify_cell(&cell.file, cell.row, cell.column, &expect)? {
                emit([format!("ok: row {} column {} reads {expect:?}", cell.row, cell.column)])
            } else {
                let found = crate::read_cell(&cell.file, cell.row, cell.column)?;
                bail!(
                    "row {} column {} reads {found:?}, expected {expect:?}",
                    cell.row,
                    cell.column
                )
            }
        }
    }
}
