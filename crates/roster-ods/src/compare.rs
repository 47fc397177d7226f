//! Part-level comparison of two packages.
//!
//! Parts are compared by decompressed bytes, so differences in compression level or entry
//! timestamps are not reported.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use crate::package::open_archive;
use crate::zip_util::{read_bytes_with_limit, MAX_PART_BYTES};
use crate::OdsError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageDiff {
    /// Parts present in the first package only.
    pub missing: Vec<String>,
    /// Parts present in the second package only.
    pub added: Vec<String>,
    /// Parts present in both with different contents.
    pub changed: Vec<String>,
}

impl PackageDiff {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.added.is_empty() && self.changed.is_empty()
    }

    /// True when nothing was added or removed and every changed part is in `allowed`.
    pub fn only_changed(&self, allowed: &[&str]) -> bool {
        self.missing.is_empty()
            && self.added.is_empty()
            && self.changed.iter().all(|part| allowed.contains(&part.as_str()))
    }
}

impl fmt::Display for PackageDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("packages are identical");
        }
        for part in &self.missing {
            writeln!(f, "missing: {part}")?;
        }
        for part in &self.added {
            writeln!(f, "added:   {part}")?;
        }
        for part in &self.changed {
            writeln!(f, "changed: {part}")?;
        }
        Ok(())
    }
}

/// Decompressed contents of every file entry, keyed by name. Directory entries map to an empty
/// body so that their presence is still compared.
fn read_parts(bytes: &[u8]) -> Result<BTreeMap<String, Vec<u8>>, OdsError> {
    let mut archive = open_archive(bytes)?;
    let mut parts = BTreeMap::new();
    for i in 0..archive.len() {
        let file = archive.by_index(i)?;
        let name = file.name().to_string();
        let body = if file.is_dir() {
            Vec::new()
        } else {
            let declared = file.size();
            read_bytes_with_limit(file, declared, &name, MAX_PART_BYTES)?
        };
        parts.insert(name, body);
    }
    Ok(parts)
}

pub fn compare_packages(expected: &[u8], actual: &[u8]) -> Result<PackageDiff, OdsError> {
    let expected = read_parts(expected)?;
    let actual = read_parts(actual)?;

    let names: BTreeSet<&String> = expected.keys().chain(actual.keys()).collect();
    let mut diff = PackageDiff::default();
    for name in names {
        match (expected.get(name), actual.get(name)) {
            (Some(_), None) => diff.missing.push(name.clone()),
            (None, Some(_)) => diff.added.push(name.clone()),
            (Some(a), Some(b)) if a != b => diff.changed.push(name.clone()),
            _ => {}
        }
    }
    Ok(diff)
}

pub fn compare_files(
    expected: impl AsRef<Path>,
    actual: impl AsRef<Path>,
) -> Result<PackageDiff, OdsError> {
    let expected = std::fs::read(expected)?;
    let actual = std::fs::read(actual)?;
    compare_packages(&expected, &actual)
}
