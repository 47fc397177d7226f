use std::fs;

use pretty_assertions::assert_eq;
use roster_ods::{OdsDocument, RowSpec};

mod common;

#[test]
fn writing_row_14_of_a_10_row_sheet_pads_and_keeps_existing_rows() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("escala.ods");
    fs::write(&path, common::build_ods(10)).expect("write fixture");

    let mut doc = OdsDocument::open(&path).expect("open");
    let table = doc.grid().locate_table().expect("table");
    doc.grid_mut().write_cell(table, 14, 1, "X").expect("write");
    doc.save().expect("save");

    let doc = OdsDocument::open(&path).expect("reopen");
    let grid = doc.grid();
    let table = grid.locate_table().expect("table");
    assert!(grid.row_count(table) >= 14);
    assert_eq!(grid.read_cell(table, 14, 1).as_deref(), Some("X"));
    for row in 1..=10u32 {
        assert_eq!(grid.read_cell(table, row, 1), Some(format!("Nome {row}")));
        assert_eq!(grid.read_cell(table, row, 2), Some(format!("Mat {row}")));
    }
    for row in 11..=13u32 {
        assert_eq!(grid.read_cell(table, row, 1), None);
    }
}

#[test]
fn report_rows_inserted_mid_sheet_survive_a_save() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("escala.ods");
    fs::write(&path, common::build_ods(4)).expect("write fixture");

    let specs = vec![
        RowSpec::Merged {
            text: "Período: 03/10 a 04/10/2025".to_string(),
            span: 6,
        },
        RowSpec::Cells(
            ["Servidor", "Matrícula", "Nº Viagem", "Conc?", "Rev?", "Obs."]
                .map(String::from)
                .to_vec(),
        ),
        RowSpec::Cells(vec!["Ana".into(), "123".into(), "".into(), "".into(), "".into(), "".into()]),
        RowSpec::Cells(vec![String::new(); 6]),
    ];

    let mut doc = OdsDocument::open(&path).expect("open");
    let table = doc.grid().locate_table().expect("table");
    doc.grid_mut()
        .insert_rows(table, 2, &specs)
        .expect("insert rows");
    doc.save().expect("save");

    let doc = OdsDocument::open(&path).expect("reopen");
    let grid = doc.grid();
    let table = grid.locate_table().expect("table");
    let column: Vec<Option<String>> = (1..=8).map(|r| grid.read_cell(table, r, 1)).collect();
    assert_eq!(
        column,
        vec![
            Some("Nome 1".to_string()),
            Some("Período: 03/10 a 04/10/2025".to_string()),
            Some("Servidor".to_string()),
            Some("Ana".to_string()),
            Some(String::new()),
            Some("Nome 2".to_string()),
            Some("Nome 3".to_string()),
            Some("Nome 4".to_string()),
        ]
    );

    let banner = grid.row(table, 2).expect("banner row");
    assert_eq!(grid.cell_count(banner), 6);
    assert_eq!(grid.read_cell(table, 2, 2), None, "covered cell has no paragraph");
    assert_eq!(grid.read_cell(table, 3, 6).as_deref(), Some("Obs."));
}
