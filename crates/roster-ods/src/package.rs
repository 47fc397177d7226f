use std::fs;
use std::io::{self, Cursor, Seek, Write};
use std::path::{Path, PathBuf};

use roster_fs::{AtomicWriteError, BackupNaming};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::grid::CellGrid;
use crate::ns::CONTENT_PART;
use crate::xml::XmlTree;
use crate::zip_util::{find_part_index, read_part_with_limit, MAX_PART_BYTES};
use crate::OdsError;

/// What a save wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveSummary {
    /// Entries copied from the source archive without recompression.
    pub parts_copied: usize,
    /// Size of the re-serialized `content.xml`.
    pub content_bytes: usize,
}

/// An opened ODS package: the original archive bytes plus the editable grid of `content.xml`.
///
/// Every other entry is carried as-is from the source archive and raw-copied on save.
#[derive(Debug, Clone)]
pub struct OdsDocument {
    path: Option<PathBuf>,
    source: Vec<u8>,
    part_names: Vec<String>,
    content_name: String,
    grid: CellGrid,
}

pub(crate) fn open_archive(bytes: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>, OdsError> {
    ZipArchive::new(Cursor::new(bytes)).map_err(|err| match err {
        ZipError::InvalidArchive(msg) => OdsError::malformed("archive", msg.to_string()),
        ZipError::UnsupportedArchive(msg) => OdsError::malformed("archive", msg.to_string()),
        other => other.into(),
    })
}

impl OdsDocument {
    /// Open the document at `path`.
    ///
    /// Fails with [`OdsError::NotFound`] when the file or its `content.xml` is missing and with
    /// [`OdsError::Malformed`] when the archive or the XML cannot be parsed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OdsError> {
        let path = path.as_ref();
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(OdsError::NotFound(path.display().to_string()))
            }
            Err(err) => return Err(err.into()),
        };
        let mut doc = Self::from_bytes(bytes)?;
        log::info!(
            "opened {} ({} parts, {} bytes)",
            path.display(),
            doc.part_names.len(),
            doc.source.len()
        );
        doc.path = Some(path.to_path_buf());
        Ok(doc)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, OdsError> {
        let (part_names, content_name, content) = {
            let mut archive = open_archive(&bytes)?;
            let part_names: Vec<String> = archive.file_names().map(str::to_string).collect();
            let content_name = find_part_index(&archive, CONTENT_PART)
                .and_then(|idx| archive.name_for_index(idx))
                .map(str::to_string)
                .ok_or_else(|| OdsError::NotFound(format!("{CONTENT_PART} in archive")))?;
            let content = read_part_with_limit(&mut archive, &content_name, MAX_PART_BYTES)?
                .ok_or_else(|| OdsError::NotFound(format!("{CONTENT_PART} in archive")))?;
            (part_names, content_name, content)
        };
        let tree = XmlTree::parse(&content_name, &content)?;
        Ok(Self {
            path: None,
            source: bytes,
            part_names,
            content_name,
            grid: CellGrid::new(tree),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Entry names in archive order.
    pub fn part_names(&self) -> &[String] {
        &self.part_names
    }

    pub fn grid(&self) -> &CellGrid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut CellGrid {
        &mut self.grid
    }

    /// Write the package to `output`: every entry in source order, raw-copied except
    /// `content.xml`, which is re-serialized from the grid and deflated.
    pub fn write_to<W: Write + Seek>(&self, output: W) -> Result<SaveSummary, OdsError> {
        let content = self.grid.tree().to_bytes()?;
        self.write_package(output, &content)
    }

    fn write_package<W: Write + Seek>(
        &self,
        output: W,
        content: &[u8],
    ) -> Result<SaveSummary, OdsError> {
        let mut archive = open_archive(&self.source)?;
        let mut zip = ZipWriter::new(output);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut parts_copied = 0;
        for i in 0..archive.len() {
            let file = archive.by_index_raw(i)?;
            if file.name() == self.content_name {
                zip.start_file(self.content_name.clone(), options)?;
                zip.write_all(content)?;
            } else {
                // Raw copy keeps compressed bytes, compression method and timestamps.
                zip.raw_copy_file(file)?;
                parts_copied += 1;
            }
        }
        zip.finish()?;

        Ok(SaveSummary {
            parts_copied,
            content_bytes: content.len(),
        })
    }

    /// Atomically replace the file this document was opened from.
    pub fn save(&self) -> Result<SaveSummary, OdsError> {
        self.save_checked(|_| Ok(()))
    }

    /// Like [`Self::save`], but `check` first sees the serialized `content.xml`. An error from
    /// `check` is returned before anything is written next to the file.
    pub fn save_checked(
        &self,
        check: impl FnOnce(&[u8]) -> Result<(), OdsError>,
    ) -> Result<SaveSummary, OdsError> {
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| OdsError::NotFound("document path (opened from bytes)".to_string()))?;
        self.save_as_checked(path, check)
    }

    /// Write the package to a temp file next to `dest` and rename it into place. On failure
    /// `dest` is left untouched.
    pub fn save_as(&self, dest: impl AsRef<Path>) -> Result<SaveSummary, OdsError> {
        self.save_as_checked(dest, |_| Ok(()))
    }

    pub fn save_as_checked(
        &self,
        dest: impl AsRef<Path>,
        check: impl FnOnce(&[u8]) -> Result<(), OdsError>,
    ) -> Result<SaveSummary, OdsError> {
        let dest = dest.as_ref();
        let content = self.grid.tree().to_bytes()?;
        check(&content)?;
        let summary = roster_fs::atomic_write(dest, |file| self.write_package(file, &content))
            .map_err(|err| match err {
                AtomicWriteError::Io(err) => OdsError::Io(err),
                AtomicWriteError::Writer(err) => err,
            })?;
        log::info!(
            "saved {} ({} parts copied, {} bytes of {})",
            dest.display(),
            summary.parts_copied,
            summary.content_bytes,
            self.content_name
        );
        Ok(summary)
    }
}

/// Copy `path` to a sibling backup before it is mutated.
pub fn backup(path: impl AsRef<Path>, naming: BackupNaming) -> Result<PathBuf, OdsError> {
    let path = path.as_ref();
    roster_fs::create_backup(path, naming).map_err(|source| OdsError::Backup {
        path: path.to_path_buf(),
        source,
    })
}
