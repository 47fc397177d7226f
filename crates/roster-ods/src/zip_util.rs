use std::io::{Read, Seek};

use zip::ZipArchive;

use crate::OdsError;

/// Largest uncompressed part inflated into memory, whatever the entry header claims.
pub(crate) const MAX_PART_BYTES: u64 = 256 * 1024 * 1024;

/// Normalize a part name for comparison: separators become `/`, leading separators are dropped
/// and ASCII letters are lowercased.
pub(crate) fn canonical_part_name(name: &str) -> String {
    name.trim_start_matches(['/', '\\'])
        .chars()
        .map(|c| if c == '\\' { '/' } else { c.to_ascii_lowercase() })
        .collect()
}

/// Index of the entry named `name`.
///
/// An exact match wins; otherwise a name differing only by a leading `/`, then one that is
/// equivalent after `canonical_part_name`. Some producers write `/content.xml` or use
/// backslashes.
pub fn find_part_index<R: Read + Seek>(
    archive: &ZipArchive<R>,
    name: &str,
) -> Option<usize> {
    let wanted = canonical_part_name(name);
    let mut slash_variant = None;
    let mut equivalent = None;
    for (idx, entry) in archive.file_names().enumerate() {
        if entry == name {
            return Some(idx);
        }
        if entry.strip_prefix('/') == Some(name) || name.strip_prefix('/') == Some(entry) {
            slash_variant.get_or_insert(idx);
        } else if canonical_part_name(entry) == wanted {
            equivalent.get_or_insert(idx);
        }
    }
    slash_variant.or(equivalent)
}

/// Read a part into memory, returning `Ok(None)` when no entry matches `name` or it is a
/// directory.
pub(crate) fn read_part_with_limit<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
    max_bytes: u64,
) -> Result<Option<Vec<u8>>, OdsError> {
    let Some(idx) = find_part_index(archive, name) else {
        return Ok(None);
    };
    let file = archive.by_index(idx)?;
    if file.is_dir() {
        return Ok(None);
    }
    let declared = file.size();
    read_bytes_with_limit(file, declared, name, max_bytes).map(Some)
}

/// Read an entry's data with an uncompressed size limit.
///
/// The declared size is checked first, then the read itself stops at `max_bytes + 1`.
pub(crate) fn read_bytes_with_limit(
    reader: impl Read,
    declared_size: u64,
    part: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, OdsError> {
    if declared_size > max_bytes {
        return Err(OdsError::PartTooLarge {
            part: part.to_string(),
            size: declared_size,
            max: max_bytes,
        });
    }

    let mut buf = Vec::new();
    let read_limit = max_bytes.checked_add(1).unwrap_or(u64::MAX);
    reader.take(read_limit).read_to_end(&mut buf)?;

    let observed = buf.len() as u64;
    if observed > max_bytes {
        return Err(OdsError::PartTooLarge {
            part: part.to_string(),
            size: observed,
            max: max_bytes,
        });
    }
    Ok(buf)
}
