#![allow(dead_code)]

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const MIMETYPE: &[u8] = b"application/vnd.oasis.opendocument.spreadsheet";

pub const MANIFEST: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<manifest:manifest xmlns:manifest="urn:oasis:names:tc:opendocument:xmlns:manifest:1.0" manifest:version="1.3">
 <manifest:file-entry manifest:full-path="/" manifest:media-type="application/vnd.oasis.opendocument.spreadsheet"/>
 <manifest:file-entry manifest:full-path="content.xml" manifest:media-type="text/xml"/>
 <manifest:file-entry manifest:full-path="styles.xml" manifest:media-type="text/xml"/>
</manifest:manifest>"#;

pub const STYLES: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-styles xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" office:version="1.3"/>"#;

/// Bytes that are not valid UTF-8 or XML, standing in for an embedded image.
pub const THUMBNAIL: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0xff, 0xfe];

/// `content.xml` with one table holding `rows` rows of `Nome i` / `Mat i` cells.
pub fn content_xml(rows: usize) -> String {
    let mut xml = String::from(concat!(
        r#"<?xml version="1.0" encoding="UTF-8"?>"#,
        "\n",
        r#"<office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" "#,
        r#"xmlns:style="urn:oasis:names:tc:opendocument:xmlns:style:1.0" "#,
        r#"xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" "#,
        r#"xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0" office:version="1.3">"#,
        "<office:automatic-styles>",
        r#"<style:style style:name="ce1" style:family="table-cell"/>"#,
        "</office:automatic-styles>",
        "<office:body><office:spreadsheet>",
        r#"<table:table table:name="Escala">"#,
        r#"<table:table-column table:number-columns-repeated="6"/>"#,
    ));
    for i in 1..=rows {
        xml.push_str(&format!(
            concat!(
                "<table:table-row>",
                r#"<table:table-cell table:style-name="ce1" office:value-type="string"><text:p>Nome {i}</text:p></table:table-cell>"#,
                r#"<table:table-cell office:value-type="string"><text:p>Mat {i}</text:p></table:table-cell>"#,
                "</table:table-row>"
            ),
            i = i
        ));
    }
    xml.push_str("</table:table></office:spreadsheet></office:body></office:document-content>");
    xml
}

/// A minimal but realistic package: stored `mimetype` first, a directory entry, a binary part,
/// and `content.xml` with `rows` rows.
pub fn build_ods(rows: usize) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("mimetype", stored).unwrap();
    zip.write_all(MIMETYPE).unwrap();
    zip.add_directory("Configurations2/", deflated).unwrap();
    zip.start_file("META-INF/manifest.xml", deflated).unwrap();
    zip.write_all(MANIFEST).unwrap();
    zip.start_file("styles.xml", deflated).unwrap();
    zip.write_all(STYLES).unwrap();
    zip.start_file("Thumbnails/thumbnail.png", stored).unwrap();
    zip.write_all(THUMBNAIL).unwrap();
    zip.start_file("content.xml", deflated).unwrap();
    zip.write_all(content_xml(rows).as_bytes()).unwrap();

    zip.finish().unwrap().into_inner()
}
