//! Editing the cell grid of OpenDocument spreadsheets (`.ods`).
//!
//! [`OdsDocument`] opens the zip package and parses `content.xml` into an owned tree; the
//! [`CellGrid`] reads, pads, and writes rows and cells on that tree; saving re-serializes
//! `content.xml` and raw-copies every other entry, then atomically swaps the result into place.

mod compare;
mod error;
mod grid;
pub mod ns;
mod package;
pub mod xml;
mod zip_util;

pub use compare::{compare_files, compare_packages, PackageDiff};
pub use error::{Axis, OdsError};
pub use grid::{check_cell_text, CellGrid, CellHandle, RowHandle, RowSpec, TableHandle};
pub use package::{backup, OdsDocument, SaveSummary};
pub use roster_fs::BackupNaming;
pub use zip_util::find_part_index;
