//! In-place document replacement and pre-edit backups.
//!
//! A replacement is staged in a temp file beside the destination, synced, and renamed over it,
//! so readers see either the old bytes or the new ones. A backup is a sibling copy of the file
//! taken before it is mutated.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tempfile::NamedTempFile;

/// Failure of [`atomic_write`]: either the staging/rename step or the caller's writer.
#[derive(Debug, thiserror::Error)]
pub enum AtomicWriteError<E> {
    #[error("replacing file failed: {0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Writer(#[source] E),
}

/// Directory a sibling of `path` lives in. A bare file name like `escala.ods` has an empty
/// parent, which maps to the current directory.
fn containing_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

/// Replace `dest` with whatever `fill` writes.
///
/// `fill` writes into a temp file in the destination's directory; on success the temp file is
/// synced and renamed over `dest`. An existing `dest` keeps its permissions; `fill` may set
/// others on the file it is handed. If `fill` fails, `dest` keeps its previous contents and the
/// temp file is removed when it is dropped.
pub fn atomic_write<T, E>(
    dest: impl AsRef<Path>,
    fill: impl FnOnce(&mut File) -> Result<T, E>,
) -> Result<T, AtomicWriteError<E>> {
    let dest = dest.as_ref();
    let dir = containing_dir(dest);
    fs::create_dir_all(dir)?;

    let mut staged = NamedTempFile::new_in(dir)?;
    // The staged file is created owner-only; a replaced file keeps the mode it had.
    match fs::metadata(dest) {
        Ok(existing) => staged.as_file().set_permissions(existing.permissions())?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }
    let value = fill(staged.as_file_mut()).map_err(AtomicWriteError::Writer)?;
    staged.as_file_mut().flush()?;
    staged.as_file().sync_all()?;

    let staged = staged.into_temp_path();
    rename_over(&staged, dest)?;
    // The new contents are in place; a failed directory sync only weakens durability.
    if let Err(err) = File::open(dir).and_then(|d| d.sync_all()) {
        log::debug!("could not sync directory {}: {err}", dir.display());
    }

    log::debug!("replaced {}", dest.display());
    Ok(value)
}

#[cfg(not(windows))]
fn rename_over(from: &Path, to: &Path) -> io::Result<()> {
    fs::rename(from, to)
}

#[cfg(windows)]
fn rename_over(from: &Path, to: &Path) -> io::Result<()> {
    use std::os::windows::ffi::OsStrExt as _;
    use windows_sys::Win32::Storage::FileSystem::{MoveFileExW, MOVEFILE_REPLACE_EXISTING};

    let wide = |path: &Path| -> Vec<u16> {
        path.as_os_str().encode_wide().chain(std::iter::once(0)).collect()
    };
    let (from, to) = (wide(from), wide(to));
    // SAFETY: both buffers are NUL-terminated and outlive the call.
    let moved = unsafe { MoveFileExW(from.as_ptr(), to.as_ptr(), MOVEFILE_REPLACE_EXISTING) };
    if moved == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// `path` with `suffix` appended to its file name, in the same directory.
pub fn with_name_suffix(path: impl AsRef<Path>, suffix: &str) -> PathBuf {
    let path = path.as_ref();
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    containing_dir(path).join(name)
}

/// How a backup copy is named next to the original file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackupNaming {
    /// `<path>.backup`; an earlier backup with the same name is replaced.
    Plain,
    /// `<path>.backup_<YYYYMMDD_HHMMSS>`; never replaces an existing file.
    #[default]
    Timestamped,
}

pub fn backup_path(path: impl AsRef<Path>, naming: BackupNaming, now: DateTime<Local>) -> PathBuf {
    match naming {
        BackupNaming::Plain => with_name_suffix(path, ".backup"),
        BackupNaming::Timestamped => {
            with_name_suffix(path, &format!(".backup_{}", now.format("%Y%m%d_%H%M%S")))
        }
    }
}

/// Copy `path` byte-for-byte to a sibling backup file and return the backup's path.
///
/// Timestamped backups taken within the same second get a `_1`, `_2`, ... suffix. The copy is
/// itself written with [`atomic_write`], so the backup name never holds a truncated file.
pub fn create_backup(path: impl AsRef<Path>, naming: BackupNaming) -> io::Result<PathBuf> {
    let path = path.as_ref();
    let mut source = File::open(path)?;
    let meta = source.metadata()?;
    if !meta.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a regular file", path.display()),
        ));
    }

    let first_choice = backup_path(path, naming, Local::now());
    let mut dest = first_choice.clone();
    if naming == BackupNaming::Timestamped {
        let mut n = 1u32;
        while dest.exists() {
            dest = with_name_suffix(&first_choice, &format!("_{n}"));
            n += 1;
        }
    }

    let permissions = meta.permissions();
    let copied = atomic_write(&dest, |out| {
        out.set_permissions(permissions)?;
        io::copy(&mut source, out)
    })
    .map_err(|err| match err {
        AtomicWriteError::Io(err) | AtomicWriteError::Writer(err) => err,
    })?;

    log::info!(
        "backed up {} to {} ({copied} bytes)",
        path.display(),
        dest.display()
    );
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;
    use std::sync::Mutex;

    static CWD_LOCK: Mutex<()> = Mutex::new(());

    struct RestoreCwd(PathBuf);

    impl Drop for RestoreCwd {
        fn drop(&mut self) {
            let _ = std::env::set_current_dir(&self.0);
        }
    }

    fn listing(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .expect("read_dir")
            .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn bare_file_name_is_written_in_the_current_directory() {
        let _lock = CWD_LOCK.lock().expect("lock");
        let tmp = tempfile::tempdir().expect("temp dir");
        let _restore = RestoreCwd(std::env::current_dir().expect("current_dir"));
        std::env::set_current_dir(tmp.path()).expect("chdir");

        atomic_write("escala.ods", |file| file.write_all(b"hello")).expect("atomic write");
        assert_eq!(fs::read(tmp.path().join("escala.ods")).expect("read"), b"hello");
    }

    #[test]
    fn writer_error_keeps_previous_contents() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let dest = tmp.path().join("escala.ods");
        fs::write(&dest, b"original").expect("seed dest");

        let err = atomic_write(&dest, |file| {
            file.write_all(b"partial")?;
            Err::<(), _>(io::Error::new(io::ErrorKind::Other, "zip writer gave up"))
        })
        .expect_err("writer error must surface");
        assert!(matches!(err, AtomicWriteError::Writer(_)));
        assert_eq!(err.to_string(), "zip writer gave up");

        assert_eq!(fs::read(&dest).expect("read dest"), b"original");
        assert_eq!(listing(tmp.path()), vec!["escala.ods"]);
    }

    #[test]
    fn successful_write_replaces_contents_and_returns_value() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let dest = tmp.path().join("nested").join("escala.ods");

        let written = atomic_write(&dest, |file| {
            file.write_all(b"new")?;
            Ok::<_, io::Error>(3usize)
        })
        .expect("write");
        assert_eq!(written, 3);
        assert_eq!(fs::read(&dest).expect("read"), b"new");
    }

    #[cfg(unix)]
    fn mode(path: &Path) -> u32 {
        use std::os::unix::fs::PermissionsExt;
        fs::metadata(path).expect("metadata").permissions().mode() & 0o777
    }

    #[cfg(unix)]
    fn set_mode(path: &Path, mode: u32) {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).expect("chmod");
    }

    #[cfg(unix)]
    #[test]
    fn replacing_a_file_keeps_its_mode() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let dest = tmp.path().join("escala.ods");
        fs::write(&dest, b"old").expect("seed");
        set_mode(&dest, 0o644);

        atomic_write(&dest, |file| file.write_all(b"new")).expect("write");
        assert_eq!(fs::read(&dest).expect("read"), b"new");
        assert_eq!(mode(&dest), 0o644);
    }

    #[cfg(unix)]
    #[test]
    fn backups_take_the_mode_of_the_source() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let src = tmp.path().join("escala.ods");
        fs::write(&src, b"v1").expect("seed");
        set_mode(&src, 0o640);

        let first = create_backup(&src, BackupNaming::Plain).expect("backup");
        assert_eq!(mode(&first), 0o640);

        set_mode(&first, 0o600);
        set_mode(&src, 0o664);
        let again = create_backup(&src, BackupNaming::Plain).expect("second backup");
        assert_eq!(again, first);
        assert_eq!(mode(&again), 0o664);
    }

    #[test]
    fn backup_path_uses_plain_or_timestamped_suffix() {
        let now = Local
            .with_ymd_and_hms(2025, 10, 3, 14, 5, 9)
            .single()
            .expect("unambiguous local time");
        let dir = Path::new("/srv/escalas");
        assert_eq!(
            backup_path(dir.join("escala.ods"), BackupNaming::Plain, now),
            dir.join("escala.ods.backup")
        );
        assert_eq!(
            backup_path(dir.join("escala.ods"), BackupNaming::Timestamped, now),
            dir.join("escala.ods.backup_20251003_140509")
        );
    }

    #[test]
    fn create_backup_copies_bytes_verbatim() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let src = tmp.path().join("escala.ods");
        let payload: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        fs::write(&src, &payload).expect("seed source");

        let backup = create_backup(&src, BackupNaming::Plain).expect("backup");
        assert_eq!(backup, tmp.path().join("escala.ods.backup"));
        assert_eq!(fs::read(&backup).expect("read backup"), payload);
        assert_eq!(fs::read(&src).expect("read source"), payload);
    }

    #[test]
    fn plain_backup_replaces_the_previous_one() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let src = tmp.path().join("escala.ods");
        fs::write(&src, b"v1").expect("seed");
        create_backup(&src, BackupNaming::Plain).expect("first");
        fs::write(&src, b"v2").expect("update");
        let backup = create_backup(&src, BackupNaming::Plain).expect("second");

        assert_eq!(fs::read(backup).expect("read"), b"v2");
        assert_eq!(listing(tmp.path()), vec!["escala.ods", "escala.ods.backup"]);
    }

    #[test]
    fn timestamped_backups_never_overwrite_each_other() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let src = tmp.path().join("escala.ods");
        fs::write(&src, b"v1").expect("seed source");

        let first = create_backup(&src, BackupNaming::Timestamped).expect("first backup");
        fs::write(&src, b"v2").expect("update source");
        let second = create_backup(&src, BackupNaming::Timestamped).expect("second backup");

        assert_ne!(first, second);
        assert_eq!(fs::read(&first).expect("read first"), b"v1");
        assert_eq!(fs::read(&second).expect("read second"), b"v2");
    }

    #[test]
    fn missing_source_fails_without_side_effects() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let err = create_backup(tmp.path().join("missing.ods"), BackupNaming::Plain)
            .expect_err("missing source");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(listing(tmp.path()).is_empty());
    }
}
