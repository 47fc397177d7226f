//! The OpenDocument namespaces the grid model understands.
//!
//! Prefixes are *not* fixed by the format: a producer may bind `table:` to any name. Elements are
//! always matched by namespace URI; the default prefixes below are only used when a document does
//! not declare a namespace we need to emit.

pub const OFFICE: &str = "urn:oasis:names:tc:opendocument:xmlns:office:1.0";
pub const TABLE: &str = "urn:oasis:names:tc:opendocument:xmlns:table:1.0";
pub const TEXT: &str = "urn:oasis:names:tc:opendocument:xmlns:text:1.0";
/// LibreOffice's extension namespace; only consulted to drop stale `calcext:value-type`.
pub const CALCEXT: &str = "urn:org:documentfoundation:names:experimental:calc:xmlns:calcext:1.0";
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";

/// Name of the archive entry holding the spreadsheet body.
pub const CONTENT_PART: &str = "content.xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Office,
    Table,
    Text,
}

impl Namespace {
    pub const fn uri(self) -> &'static str {
        match self {
            Namespace::Office => OFFICE,
            Namespace::Table => TABLE,
            Namespace::Text => TEXT,
        }
    }

    pub const fn default_prefix(self) -> &'static str {
        match self {
            Namespace::Office => "office",
            Namespace::Table => "table",
            Namespace::Text => "text",
        }
    }
}
