//! Atomic file copy.
//!
//! ## `copy_atomic` protocol
//!
//! 1. Create a uniquely named temp file (`.mirror-XXXXXX.tmp`) in the
//!    destination directory. Creation is exclusive, so an existing entry with
//!    the same name is never reused or clobbered.
//! 2. Stream the source content into it, then copy permission bits and stamp
//!    the source's access and modification times.
//! 3. Persist it over `dest` (atomic rename, same filesystem by construction).
//!
//! On any failure the temp file is dropped (and deleted) and `dest` is left
//! as it was.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use filetime::FileTime;
use tempfile::{Builder, NamedTempFile};

/// Prefix of in-flight copies. A leftover temp file has no source counterpart
/// and is pruned by the next reverse pass.
pub const TMP_PREFIX: &str = ".mirror-";

/// Suffix of in-flight copies.
pub const TMP_SUFFIX: &str = ".tmp";

/// Copy `source` onto `dest`, replacing it atomically.
pub fn copy_atomic(source: &Path, dest: &Path) -> io::Result<()> {
    let meta = fs::metadata(source)?;
    let dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = Builder::new()
        .prefix(TMP_PREFIX)
        .suffix(TMP_SUFFIX)
        .tempfile_in(dir)?;
    fill(source, &meta, &mut tmp)?;

    tmp.persist(dest).map_err(|err| err.error)?;
    Ok(())
}

fn fill(source: &Path, meta: &fs::Metadata, tmp: &mut NamedTempFile) -> io::Result<()> {
    let mut reader = File::open(source)?;
    io::copy(&mut reader, tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    fs::set_permissions(tmp.path(), meta.permissions())?;

    let mtime = FileTime::from_last_modification_time(meta);
    let atime = FileTime::from_last_access_time(meta);
    filetime::set_file_times(tmp.path(), atime, mtime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn copy_replaces_content_and_preserves_mtime() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("dst.txt");
        fs::write(&src, b"fresh").unwrap();
        fs::write(&dst, b"stale content").unwrap();
        let stamp = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&src, stamp).unwrap();

        copy_atomic(&src, &dst).unwrap();

        assert_eq!(fs::read(&dst).unwrap(), b"fresh");
        let copied = FileTime::from_last_modification_time(&fs::metadata(&dst).unwrap());
        assert_eq!(copied.unix_seconds(), stamp.unix_seconds());
        assert_eq!(entry_names(dir.path()), vec!["dst.txt", "src.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn copy_preserves_permission_bits() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let src = dir.path().join("run.sh");
        let dst = dir.path().join("run-copy.sh");
        fs::write(&src, b"#!/bin/sh\n").unwrap();
        fs::set_permissions(&src, fs::Permissions::from_mode(0o750)).unwrap();

        copy_atomic(&src, &dst).unwrap();

        let mode = fs::metadata(&dst).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o750);
    }

    #[test]
    fn neighbours_named_like_temp_files_are_untouched() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("f");
        fs::write(&src, b"v2").unwrap();
        fs::write(&dst, b"v1").unwrap();
        fs::create_dir(dir.path().join("f.mirror.tmp")).unwrap();
        fs::write(dir.path().join(".mirror-f.tmp"), b"user data").unwrap();

        copy_atomic(&src, &dst).unwrap();

        assert_eq!(fs::read(&dst).unwrap(), b"v2");
        assert!(dir.path().join("f.mirror.tmp").is_dir());
        assert_eq!(fs::read(dir.path().join(".mirror-f.tmp")).unwrap(), b"user data");
    }

    #[test]
    fn failed_copy_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let dst = dir.path().join("dst.txt");
        let err = copy_atomic(&dir.path().join("missing"), &dst).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(entry_names(dir.path()).is_empty());
    }

    #[test]
    fn rename_failure_cleans_up_temp_file() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.txt");
        fs::write(&src, b"data").unwrap();
        // A non-empty directory at the destination makes the rename fail.
        let dst = dir.path().join("occupied");
        fs::create_dir(&dst).unwrap();
        fs::write(dst.join("child"), b"x").unwrap();

        assert!(copy_atomic(&src, &dst).is_err());
        assert_eq!(entry_names(dir.path()), vec!["occupied", "src.txt"]);
    }
}
