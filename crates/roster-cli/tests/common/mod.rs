#![allow(dead_code)]

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// A roster with `rows` filled rows, written into `dir` as `escala.ods`.
pub fn write_roster(dir: &Path, rows: usize) -> PathBuf {
    write_roster_with_content_name(dir, rows, "content.xml")
}

/// Like [`write_roster`], with the content part stored under `content_name`.
pub fn write_roster_with_content_name(dir: &Path, rows: usize, content_name: &str) -> PathBuf {
    let mut content = String::from(concat!(
        r#"<?xml version="1.0" encoding="UTF-8"?>"#,
        r#"<office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" "#,
        r#"xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" "#,
        r#"xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0" office:version="1.3">"#,
        r#"<office:body><office:spreadsheet><table:table table:name="Escala">"#,
    ));
    for i in 1..=rows {
        content.push_str(&format!(
            "<table:table-row><table:table-cell office:value-type=\"string\"><text:p>Linha {i}</text:p></table:table-cell></table:table-row>"
        ));
    }
    content.push_str("</table:table></office:spreadsheet></office:body></office:document-content>");

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file("mimetype", stored).unwrap();
    zip.write_all(b"application/vnd.oasis.opendocument.spreadsheet")
        .unwrap();
    zip.start_file("META-INF/manifest.xml", deflated).unwrap();
    zip.write_all(b"<manifest:manifest xmlns:manifest=\"urn:oasis:names:tc:opendocument:xmlns:manifest:1.0\"/>")
        .unwrap();
    zip.start_file("styles.xml", deflated).unwrap();
    zip.write_all(b"<office:document-styles xmlns:office=\"urn:oasis:names:tc:opendocument:xmlns:office:1.0\"/>")
        .unwrap();
    zip.start_file(content_name, deflated).unwrap();
    zip.write_all(content.as_bytes()).unwrap();
    let bytes = zip.finish().unwrap().into_inner();

    let path = dir.join("escala.ods");
    fs::write(&path, bytes).unwrap();
    path
}

/// Names of the files in `dir`, sorted.
pub fn dir_listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
