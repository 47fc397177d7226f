use std::fs;
use std::io::{Cursor, Read};

use roster_ods::{backup, compare_files, BackupNaming, OdsDocument, OdsError};
use zip::ZipArchive;

mod common;

/// Raw (still compressed) bytes and compression method of every entry, in archive order.
fn raw_entries(bytes: &[u8]) -> Vec<(String, zip::CompressionMethod, Vec<u8>)> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("open zip");
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index_raw(i).expect("raw entry");
            let mut raw = Vec::new();
            file.read_to_end(&mut raw).expect("read raw entry");
            (file.name().to_string(), file.compression(), raw)
        })
        .collect()
}

#[test]
fn save_rewrites_content_and_copies_every_other_part_verbatim() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("escala.ods");
    let original = common::build_ods(10);
    fs::write(&path, &original).expect("write fixture");

    let mut doc = OdsDocument::open(&path).expect("open");
    let table = doc.grid().locate_table().expect("table");
    doc.grid_mut()
        .write_cell(table, 3, 2, "alterado")
        .expect("write cell");
    let summary = doc.save().expect("save");

    let before = raw_entries(&original);
    let after = raw_entries(&fs::read(&path).expect("read saved"));
    assert_eq!(before.len(), 6);
    assert_eq!(after.len(), before.len());
    assert_eq!(summary.parts_copied, before.len() - 1);

    for (old, new) in before.iter().zip(&after) {
        assert_eq!(old.0, new.0, "entry order changed");
        if old.0 == "content.xml" {
            assert_ne!(old.2, new.2, "content.xml should have been rewritten");
            continue;
        }
        assert_eq!(old.1, new.1, "compression method of {} changed", old.0);
        assert!(old.2 == new.2, "raw bytes of {} changed", old.0);
    }

    let backup_path = dir.path().join("before.ods");
    fs::write(&backup_path, &original).expect("write copy");
    let diff = compare_files(&backup_path, &path).expect("compare");
    assert!(diff.only_changed(&["content.xml"]), "{diff}");
    assert_eq!(diff.changed, vec!["content.xml".to_string()]);
}

#[test]
fn failed_save_leaves_original_untouched() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("escala.ods");

    // Break the local header of an entry the save has to copy. The central directory (and so
    // `open`) is unaffected; the save fails after it has already written earlier entries.
    let mut bytes = common::build_ods(10);
    let name = b"Thumbnails/thumbnail.png";
    let local_name_at = bytes
        .windows(name.len())
        .position(|window| window == name)
        .expect("local header name");
    bytes[local_name_at - 30] ^= 0xFF;
    fs::write(&path, &bytes).expect("write fixture");

    let mut doc = OdsDocument::open(&path).expect("open");
    let table = doc.grid().locate_table().expect("table");
    doc.grid_mut().write_cell(table, 1, 1, "X").expect("write");

    let err = doc.save().expect_err("save should fail");
    assert!(matches!(err, OdsError::Zip(_)), "{err:?}");

    assert_eq!(fs::read(&path).expect("read original"), bytes);
    let entries: Vec<_> = fs::read_dir(dir.path())
        .expect("read_dir")
        .map(|e| e.expect("dir entry").path())
        .collect();
    assert_eq!(entries, vec![path], "expected no temp files to remain");
}

#[test]
fn open_reports_missing_file_and_non_ods_input() {
    let dir = tempfile::tempdir().expect("temp dir");

    match OdsDocument::open(dir.path().join("missing.ods")) {
        Err(OdsError::NotFound(what)) => assert!(what.ends_with("missing.ods"), "{what}"),
        other => panic!("expected NotFound, got {other:?}"),
    }

    let text = dir.path().join("notes.ods");
    fs::write(&text, "not a zip").expect("write");
    assert!(matches!(
        OdsDocument::open(&text),
        Err(OdsError::Malformed { .. })
    ));
}

#[test]
fn backup_is_a_verbatim_sibling_copy() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("escala.ods");
    let original = common::build_ods(2);
    fs::write(&path, &original).expect("write fixture");

    let plain = backup(&path, BackupNaming::Plain).expect("plain backup");
    assert_eq!(plain, dir.path().join("escala.ods.backup"));
    assert_eq!(fs::read(&plain).expect("read backup"), original);

    let stamped = backup(&path, BackupNaming::Timestamped).expect("timestamped backup");
    let stamped_name = stamped.file_name().unwrap().to_string_lossy().into_owned();
    assert!(stamped_name.starts_with("escala.ods.backup_"), "{stamped_name}");
    assert_eq!(fs::read(&stamped).expect("read backup"), original);

    match backup(dir.path().join("missing.ods"), BackupNaming::Plain) {
        Err(OdsError::Backup { path, .. }) => assert!(path.ends_with("missing.ods")),
        other => panic!("expected Backup error, got {other:?}"),
    }
}
