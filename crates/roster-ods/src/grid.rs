//! Row/cell addressing over the parsed `content.xml` tree.
//!
//! Rows are the `table:table-row` children of the first `table:table` in
//! `office:body/office:spreadsheet`. Cells are addressed by position among a row's
//! `table:table-cell` and `table:covered-table-cell` children. External indices are 1-based.
//!
//! The grid only grows: padding appends rows/cells, and nothing here removes a row or a cell.

use crate::error::Axis;
use crate::ns::{self, Namespace};
use crate::xml::{is_xml_char, NodeId, XmlTree};
use crate::OdsError;

/// Typed-value attributes that would make a spreadsheet application display something other
/// than the text we write.
const STALE_VALUE_ATTRS: &[(&str, &str)] = &[
    (ns::OFFICE, "value-type"),
    (ns::OFFICE, "value"),
    (ns::OFFICE, "date-value"),
    (ns::OFFICE, "time-value"),
    (ns::OFFICE, "boolean-value"),
    (ns::OFFICE, "string-value"),
    (ns::TABLE, "formula"),
    (ns::CALCEXT, "value-type"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableHandle(NodeId);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowHandle(NodeId);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellHandle(NodeId);

/// Content of one row to be emitted into the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowSpec {
    /// One cell spanning `span` columns followed by `span - 1` covered cells.
    Merged { text: String, span: u32 },
    /// Independent cells, one text paragraph each.
    Cells(Vec<String>),
}

impl RowSpec {
    /// Check every text of the row with [`check_cell_text`].
    pub fn validate(&self) -> Result<(), OdsError> {
        match self {
            RowSpec::Merged { text, .. } => check_cell_text(text),
            RowSpec::Cells(values) => values.iter().try_for_each(|v| check_cell_text(v)),
        }
    }
}

/// Reject text holding a character XML 1.0 cannot represent (most C0 controls, U+FFFE, U+FFFF).
pub fn check_cell_text(text: &str) -> Result<(), OdsError> {
    match text.chars().enumerate().find(|&(_, c)| !is_xml_char(c)) {
        Some((position, character)) => Err(OdsError::InvalidText {
            character,
            position,
        }),
        None => Ok(()),
    }
}

/// The spreadsheet grid of one document. Owns the parsed tree until the document is saved.
#[derive(Debug, Clone)]
pub struct CellGrid {
    tree: XmlTree,
}

impl CellGrid {
    pub fn new(tree: XmlTree) -> Self {
        Self { tree }
    }

    pub fn tree(&self) -> &XmlTree {
        &self.tree
    }

    /// First `table:table` inside the spreadsheet body.
    pub fn locate_table(&self) -> Result<TableHandle, OdsError> {
        let root = self.tree.root();
        let body = self
            .tree
            .child_elements(root, Namespace::Office, "body")
            .next()
            .ok_or(OdsError::StructureNotFound("office:body"))?;
        let spreadsheet = self
            .tree
            .child_elements(body, Namespace::Office, "spreadsheet")
            .next()
            .ok_or(OdsError::StructureNotFound("office:spreadsheet"))?;
        let table = self
            .tree
            .child_elements(spreadsheet, Namespace::Table, "table")
            .next()
            .ok_or(OdsError::StructureNotFound("table:table"))?;
        Ok(TableHandle(table))
    }

    fn rows(&self, table: TableHandle) -> Vec<NodeId> {
        self.tree
            .child_elements(table.0, Namespace::Table, "table-row")
            .collect()
    }

    fn cells(&self, row: RowHandle) -> Vec<NodeId> {
        self.tree
            .children(row.0)
            .iter()
            .copied()
            .filter(|&child| is_cell(&self.tree, child))
            .collect()
    }

    pub fn row_count(&self, table: TableHandle) -> usize {
        self.rows(table).len()
    }

    /// Row at 1-based `index`, if it exists.
    pub fn row(&self, table: TableHandle, index: u32) -> Option<RowHandle> {
        let idx = usize::try_from(index).ok()?.checked_sub(1)?;
        self.rows(table).get(idx).copied().map(RowHandle)
    }

    pub fn cell_count(&self, row: RowHandle) -> usize {
        self.cells(row).len()
    }

    /// Make sure the table has at least `index` rows, appending empty ones after the last row.
    pub fn ensure_row(&mut self, table: TableHandle, index: u32) -> Result<RowHandle, OdsError> {
        let wanted = one_based(Axis::Row, index)?;
        let mut rows = self.rows(table);
        let missing = wanted.saturating_sub(rows.len());
        for _ in 0..missing {
            let row = self.tree.create_element(Namespace::Table, "table-row");
            let at = self.row_insertion_index(table, &rows);
            self.tree.insert_child(table.0, at, row);
            rows.push(row);
        }
        if missing > 0 {
            log::debug!("padded table with {missing} empty rows (now {})", rows.len());
        }
        Ok(RowHandle(rows[wanted - 1]))
    }

    /// Make sure `row` has at least `index` cells, appending empty ones after the last cell.
    pub fn ensure_cell(&mut self, row: RowHandle, index: u32) -> Result<CellHandle, OdsError> {
        let wanted = one_based(Axis::Column, index)?;
        let mut cells = self.cells(row);
        while cells.len() < wanted {
            let cell = self.tree.create_element(Namespace::Table, "table-cell");
            let at = match cells.last() {
                Some(&last) => self.tree.position_in_parent(last).map_or(0, |pos| pos + 1),
                None => self.tree.children(row.0).len(),
            };
            self.tree.insert_child(row.0, at, cell);
            cells.push(cell);
        }
        Ok(CellHandle(cells[wanted - 1]))
    }

    /// Text of the first paragraph of the cell at (`row`, `column`).
    ///
    /// Total: out-of-range or zero indices and cells without a paragraph read as `None`.
    pub fn read_cell(&self, table: TableHandle, row: u32, column: u32) -> Option<String> {
        let row = self.row(table, row)?;
        let col = usize::try_from(column).ok()?.checked_sub(1)?;
        let cell = *self.cells(row).get(col)?;
        let paragraph = self
            .tree
            .child_elements(cell, Namespace::Text, "p")
            .next()?;
        let mut out = String::new();
        collect_paragraph_text(&self.tree, paragraph, &mut out);
        Some(out)
    }

    /// Overwrite the cell at (`row`, `column`) with a single paragraph holding `text`, padding
    /// rows and cells as needed. Previous content of the cell is discarded.
    ///
    /// Indices and text are checked before anything is padded, so a rejected write leaves the
    /// grid as it was.
    pub fn write_cell(
        &mut self,
        table: TableHandle,
        row: u32,
        column: u32,
        text: &str,
    ) -> Result<CellHandle, OdsError> {
        one_based(Axis::Row, row)?;
        one_based(Axis::Column, column)?;
        check_cell_text(text)?;
        let row = self.ensure_row(table, row)?;
        let cell = self.ensure_cell(row, column)?;
        self.fill_cell(cell.0, text);
        Ok(cell)
    }

    /// Append a row built from `spec` after the last existing row.
    pub fn append_row(
        &mut self,
        table: TableHandle,
        spec: &RowSpec,
    ) -> Result<RowHandle, OdsError> {
        spec.validate()?;
        let row = self.build_row(spec);
        let rows = self.rows(table);
        let at = self.row_insertion_index(table, &rows);
        self.tree.insert_child(table.0, at, row);
        Ok(RowHandle(row))
    }

    /// Insert a row built from `spec` so that it becomes row `position`.
    ///
    /// Rows from `position` on move down by one. A position past the end pads the table with
    /// empty rows first.
    pub fn insert_row_at(
        &mut self,
        table: TableHandle,
        position: u32,
        spec: &RowSpec,
    ) -> Result<RowHandle, OdsError> {
        let wanted = one_based(Axis::Row, position)?;
        spec.validate()?;
        let rows = self.rows(table);
        if let Some(&before) = rows.get(wanted - 1) {
            let at = self.tree.position_in_parent(before).unwrap_or(0);
            let row = self.build_row(spec);
            self.tree.insert_child(table.0, at, row);
            return Ok(RowHandle(row));
        }
        if wanted > 1 {
            self.ensure_row(table, position - 1)?;
        }
        self.append_row(table, spec)
    }

    /// Insert `specs` as consecutive rows starting at `start_row`.
    pub fn insert_rows(
        &mut self,
        table: TableHandle,
        start_row: u32,
        specs: &[RowSpec],
    ) -> Result<Vec<RowHandle>, OdsError> {
        one_based(Axis::Row, start_row)?;
        for spec in specs {
            spec.validate()?;
        }
        let mut inserted = Vec::with_capacity(specs.len());
        for (offset, spec) in (0u32..).zip(specs) {
            let position = start_row.saturating_add(offset);
            inserted.push(self.insert_row_at(table, position, spec)?);
        }
        log::debug!("inserted {} rows at row {start_row}", inserted.len());
        Ok(inserted)
    }

    /// Index in the table's children just after the last row, or the end of the table.
    fn row_insertion_index(&self, table: TableHandle, rows: &[NodeId]) -> usize {
        match rows.last() {
            Some(&last) => self.tree.position_in_parent(last).map_or(0, |pos| pos + 1),
            None => self.tree.children(table.0).len(),
        }
    }

    fn build_row(&mut self, spec: &RowSpec) -> NodeId {
        let row = self.tree.create_element(Namespace::Table, "table-row");
        match spec {
            RowSpec::Merged { text, span } => {
                let span = (*span).max(1);
                let cell = self.tree.create_element(Namespace::Table, "table-cell");
                self.tree.set_attribute(
                    cell,
                    Namespace::Table,
                    "number-columns-spanned",
                    &span.to_string(),
                );
                self.tree
                    .set_attribute(cell, Namespace::Table, "number-rows-spanned", "1");
                self.fill_cell(cell, text);
                self.tree.append_child(row, cell);
                for _ in 1..span {
                    let covered = self
                        .tree
                        .create_element(Namespace::Table, "covered-table-cell");
                    self.tree.append_child(row, covered);
                }
            }
            RowSpec::Cells(values) => {
                for value in values {
                    let cell = self.tree.create_element(Namespace::Table, "table-cell");
                    self.fill_cell(cell, value);
                    self.tree.append_child(row, cell);
                }
            }
        }
        row
    }

    fn fill_cell(&mut self, cell: NodeId, text: &str) {
        self.tree.retain_attributes(cell, |ns_uri, local| {
            !STALE_VALUE_ATTRS
                .iter()
                .any(|&(stale_ns, stale_local)| ns_uri == Some(stale_ns) && local == stale_local)
        });
        if !text.is_empty() {
            self.tree
                .set_attribute(cell, Namespace::Office, "value-type", "string");
        }

        let paragraph = self.tree.create_element(Namespace::Text, "p");
        encode_paragraph_text(&mut self.tree, paragraph, text);
        self.tree.replace_children(cell, vec![paragraph]);
    }
}

fn one_based(axis: Axis, index: u32) -> Result<usize, OdsError> {
    match usize::try_from(index) {
        Ok(idx) if idx >= 1 => Ok(idx),
        _ => Err(OdsError::InvalidIndex { axis, index }),
    }
}

fn is_cell(tree: &XmlTree, id: NodeId) -> bool {
    tree.is(id, Namespace::Table, "table-cell") || tree.is(id, Namespace::Table, "covered-table-cell")
}

/// Flatten a paragraph to plain text. `text:s`, `text:tab` and `text:line-break` become the
/// characters they stand for; spans and links contribute their text.
fn collect_paragraph_text(tree: &XmlTree, node: NodeId, out: &mut String) {
    for &child in tree.children(node) {
        if let Some(text) = tree.text(child) {
            out.push_str(&text);
        } else if tree.is(child, Namespace::Text, "s") {
            let count = tree
                .attribute(child, ns::TEXT, "c")
                .and_then(|c| c.trim().parse::<usize>().ok())
                .unwrap_or(1);
            out.extend(std::iter::repeat(' ').take(count));
        } else if tree.is(child, Namespace::Text, "tab") {
            out.push('\t');
        } else if tree.is(child, Namespace::Text, "line-break") {
            out.push('\n');
        } else if tree.element(child).is_some() {
            collect_paragraph_text(tree, child, out);
        }
    }
}

/// Write `text` into `paragraph` the way office suites expect it: newlines and tabs become
/// `text:line-break`/`text:tab`, and space runs that XML whitespace handling would collapse
/// become `text:s`.
fn encode_paragraph_text(tree: &mut XmlTree, paragraph: NodeId, text: &str) {
    let mut literal = String::new();
    let mut at_line_start = true;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ' ' => {
                let mut run = 1usize;
                while chars.peek() == Some(&' ') {
                    chars.next();
                    run += 1;
                }
                let at_line_end = matches!(chars.peek(), None | Some('\n') | Some('\t'));
                if at_line_start || at_line_end {
                    flush_literal(tree, paragraph, &mut literal);
                    push_spaces(tree, paragraph, run);
                } else {
                    literal.push(' ');
                    if run > 1 {
                        flush_literal(tree, paragraph, &mut literal);
                        push_spaces(tree, paragraph, run - 1);
                    }
                }
            }
            '\n' | '\t' => {
                flush_literal(tree, paragraph, &mut literal);
                let local = if c == '\n' { "line-break" } else { "tab" };
                let marker = tree.create_element(Namespace::Text, local);
                tree.append_child(paragraph, marker);
                at_line_start = true;
                continue;
            }
            other => literal.push(other),
        }
        at_line_start = false;
    }
    flush_literal(tree, paragraph, &mut literal);
}

fn flush_literal(tree: &mut XmlTree, paragraph: NodeId, literal: &mut String) {
    if literal.is_empty() {
        return;
    }
    let text = tree.create_text(literal);
    tree.append_child(paragraph, text);
    literal.clear();
}

fn push_spaces(tree: &mut XmlTree, paragraph: NodeId, count: usize) {
    let spaces = tree.create_element(Namespace::Text, "s");
    if count > 1 {
        tree.set_attribute(spaces, Namespace::Text, "c", &count.to_string());
    }
    tree.append_child(paragraph, spaces);
}
