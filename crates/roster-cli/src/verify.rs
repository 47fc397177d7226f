//! Independent re-read of a saved document.
//!
//! `content.xml` is parsed with `roxmltree` rather than with the editor's own XML tree, so the
//! check does not share a parser with the writer. It runs on the serialized part before the save
//! and on the saved file after it.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use roster_ods::ns;
use roxmltree::{Document, Node};

const MAX_CONTENT_BYTES: u64 = 256 * 1024 * 1024;

/// Texts of the first table: one entry per row, one per cell position, `None` for a cell with
/// no paragraph (covered cells included).
pub type GridSnapshot = Vec<Vec<Option<String>>>;

/// Snapshot of the first table of the saved document at `path`.
pub fn snapshot(path: &Path) -> Result<GridSnapshot> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut archive =
        zip::ZipArchive::new(file).with_context(|| format!("read zip {}", path.display()))?;
    let index = roster_ods::find_part_index(&archive, ns::CONTENT_PART)
        .ok_or_else(|| anyhow!("{} not found in {}", ns::CONTENT_PART, path.display()))?;
    let mut content = Vec::new();
    archive
        .by_index(index)
        .with_context(|| format!("{} in {}", ns::CONTENT_PART, path.display()))?
        .take(MAX_CONTENT_BYTES + 1)
        .read_to_end(&mut content)
        .with_context(|| format!("read {}", ns::CONTENT_PART))?;
    if content.len() as u64 > MAX_CONTENT_BYTES {
        bail!("{} in {} is too large to verify", ns::CONTENT_PART, path.display());
    }
    snapshot_content(&content)
}

/// Snapshot of the first table of a serialized `content.xml`.
pub fn snapshot_content(content: &[u8]) -> Result<GridSnapshot> {
    let content = std::str::from_utf8(content).context("content.xml is not utf-8")?;
    let doc = Document::parse(content).context("parse content.xml")?;
    let table = first_table(&doc).ok_or_else(|| anyhow!("saved document has no table"))?;
    Ok(table
        .children()
        .filter(|row| is(row, ns::TABLE, "table-row"))
        .map(|row| {
            row.children()
                .filter(|cell| {
                    is(cell, ns::TABLE, "table-cell") || is(cell, ns::TABLE, "covered-table-cell")
                })
                .map(|cell| cell_text(&cell))
                .collect()
        })
        .collect())
}

/// Text at 1-based (`row`, `column`) of a snapshot.
pub fn cell(snapshot: &GridSnapshot, row: u32, column: u32) -> Option<&str> {
    let row = snapshot.get((row as usize).checked_sub(1)?)?;
    row.get((column as usize).checked_sub(1)?)?.as_deref()
}

fn is(node: &Node<'_, '_>, ns_uri: &str, local: &str) -> bool {
    node.is_element()
        && node.tag_name().namespace() == Some(ns_uri)
        && node.tag_name().name() == local
}

fn first_table<'a, 'input>(doc: &'a Document<'input>) -> Option<Node<'a, 'input>> {
    let body = doc
        .root_element()
        .children()
        .find(|n| is(n, ns::OFFICE, "body"))?;
    let spreadsheet = body.children().find(|n| is(n, ns::OFFICE, "spreadsheet"))?;
    spreadsheet.children().find(|n| is(n, ns::TABLE, "table"))
}

fn cell_text(cell: &Node<'_, '_>) -> Option<String> {
    let paragraph = cell.children().find(|n| is(n, ns::TEXT, "p"))?;
    let mut out = String::new();
    flatten(&paragraph, &mut out);
    Some(out)
}

fn flatten(node: &Node<'_, '_>, out: &mut String) {
    for child in node.children() {
        if child.is_text() {
            out.push_str(child.text().unwrap_or_default());
        } else if is(&child, ns::TEXT, "s") {
            let count = child
                .attribute((ns::TEXT, "c"))
                .and_then(|c| c.parse::<usize>().ok())
                .unwrap_or(1);
            out.extend(std::iter::repeat(' ').take(count));
        } else if is(&child, ns::TEXT, "tab") {
            out.push('\t');
        } else if is(&child, ns::TEXT, "line-break") {
            out.push('\n');
        } else if child.is_element() {
            flatten(&child, out);
        }
    }
}
