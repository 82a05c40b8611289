//! Size-based rotation for the durable mirror log.
//!
//! Keeps at most `max_files` archived copies using the scheme:
//!   mirror.log → mirror.log.1 → mirror.log.2 → … → mirror.log.<max_files>
//!
//! [`RotatingFile`] checks the size before every record, so a record is never
//! split across two files and nothing is dropped until the archive cap is hit.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{io_err, DaemonError};

/// Rotate `log_path` if its size has reached `max_bytes`.
///
/// Returns `true` if rotation occurred, `false` if the file was under the
/// threshold, did not exist yet, or `max_files` is zero.
///
/// # Errors
/// Returns `io::Error` only on unexpected filesystem failures; missing files
/// are silently skipped.
pub fn rotate_if_needed(log_path: &Path, max_bytes: u64, max_files: usize) -> io::Result<bool> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };

    if size < max_bytes || max_files == 0 {
        return Ok(false);
    }

    archive(log_path, max_files)?;
    Ok(true)
}

/// Shift archives up by one and move the live log to `.1`.
///
/// Rotation sequence (oldest first):
///   `<name>.<max_files>` deleted
///   `<name>.<n>` → `<name>.<n+1>` for n = max_files-1 … 1
///   `<name>` → `<name>.1`
fn archive(log_path: &Path, max_files: usize) -> io::Result<()> {
    let oldest = numbered_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }

    for n in (1..max_files).rev() {
        let src = numbered_path(log_path, n);
        if src.exists() {
            fs::rename(&src, numbered_path(log_path, n + 1))?;
        }
    }

    fs::rename(log_path, numbered_path(log_path, 1))
}

/// Build the path for the `n`-th archived copy of `base` (e.g. `mirror.log.2`).
pub fn numbered_path(base: &Path, n: usize) -> PathBuf {
    let name = base
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("mirror.log");
    base.with_file_name(format!("{name}.{n}"))
}

// ---------------------------------------------------------------------------
// RotatingFile
// ---------------------------------------------------------------------------

/// Append-only log file that archives itself once the next record would push
/// it past `max_bytes`.
#[derive(Debug)]
pub struct RotatingFile {
    path: PathBuf,
    file: Option<File>,
    size: u64,
    max_bytes: u64,
    max_files: usize,
}

impl RotatingFile {
    /// Open (or create) `path` for appending, creating parent directories.
    ///
    /// An existing file already over the limit is archived first.
    pub fn open(path: &Path, max_bytes: u64, max_files: usize) -> Result<Self, DaemonError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        rotate_if_needed(path, max_bytes, max_files).map_err(|e| io_err(path, e))?;

        let file = open_append(path).map_err(|e| io_err(path, e))?;
        let size = file.metadata().map_err(|e| io_err(path, e))?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            size,
            max_bytes,
            max_files,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn should_rotate(&self, incoming: usize) -> bool {
        self.max_files > 0
            && self.size > 0
            && self.size.saturating_add(incoming as u64) > self.max_bytes
    }

    fn rotate(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        let archived = archive(&self.path, self.max_files);
        // Reopen even when archiving failed so logging carries on.
        let file = open_append(&self.path)?;
        self.size = file.metadata()?.len();
        self.file = Some(file);
        archived
    }

    fn live(&mut self) -> io::Result<&mut File> {
        if self.file.is_none() {
            let file = open_append(&self.path)?;
            self.size = file.metadata()?.len();
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("log file unavailable"))
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.should_rotate(buf.len()) {
            if let Err(err) = self.rotate() {
                // Logging through tracing here would re-enter this writer.
                eprintln!("mirror: log rotation failed for {}: {err}", self.path.display());
            }
        }
        let file = self.live()?;
        file.write_all(buf)?;
        self.size = self.size.saturating_add(buf.len() as u64);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const LIMIT: u64 = 64;

    #[test]
    fn rotation_noop_when_file_under_threshold() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("mirror.log");
        fs::write(&log, b"small").unwrap();
        let rotated = rotate_if_needed(&log, LIMIT, 3).unwrap();
        assert!(!rotated, "should not rotate a small file");
        assert!(!numbered_path(&log, 1).exists(), "no .1 file should exist");
    }

    #[test]
    fn rotation_skips_missing_file_gracefully() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("nonexistent.log");
        assert!(!rotate_if_needed(&log, LIMIT, 3).unwrap());
    }

    #[test]
    fn zero_archive_count_never_rotates() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("mirror.log");
        fs::write(&log, vec![b'x'; LIMIT as usize * 2]).unwrap();
        assert!(!rotate_if_needed(&log, LIMIT, 0).unwrap());
        assert_eq!(fs::metadata(&log).unwrap().len(), LIMIT * 2);
    }

    #[test]
    fn open_archives_oversized_existing_log() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("mirror.log");
        fs::write(&log, vec![b'x'; LIMIT as usize + 1]).unwrap();

        let writer = RotatingFile::open(&log, LIMIT, 2).unwrap();
        assert_eq!(writer.path(), log.as_path());
        assert_eq!(fs::metadata(&log).unwrap().len(), 0);
        assert_eq!(fs::metadata(numbered_path(&log, 1)).unwrap().len(), LIMIT + 1);
    }

    #[test]
    fn record_that_would_overflow_goes_to_fresh_file() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("mirror.log");
        let mut writer = RotatingFile::open(&log, LIMIT, 2).unwrap();

        writer.write_all(&[b'a'; 40]).unwrap();
        writer.write_all(&[b'b'; 40]).unwrap();
        writer.flush().unwrap();

        assert_eq!(fs::read(numbered_path(&log, 1)).unwrap(), vec![b'a'; 40]);
        assert_eq!(fs::read(&log).unwrap(), vec![b'b'; 40]);
    }

    #[test]
    fn oversized_single_record_is_kept_whole() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("mirror.log");
        let mut writer = RotatingFile::open(&log, LIMIT, 2).unwrap();

        writer.write_all(&[b'z'; 100]).unwrap();
        writer.flush().unwrap();

        assert_eq!(fs::metadata(&log).unwrap().len(), 100);
        assert!(!numbered_path(&log, 1).exists());
    }

    #[test]
    fn archive_count_is_capped_and_newest_first() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("mirror.log");
        let mut writer = RotatingFile::open(&log, LIMIT, 2).unwrap();

        for round in b'1'..=b'4' {
            writer.write_all(&[round; 60]).unwrap();
        }
        writer.flush().unwrap();

        assert_eq!(fs::read(&log).unwrap(), vec![b'4'; 60]);
        assert_eq!(fs::read(numbered_path(&log, 1)).unwrap(), vec![b'3'; 60]);
        assert_eq!(fs::read(numbered_path(&log, 2)).unwrap(), vec![b'2'; 60]);
        assert!(
            !numbered_path(&log, 3).exists(),
            "must not keep more than max_files archives"
        );
    }

    #[test]
    fn open_creates_missing_parent_directories() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("logs").join("nested").join("mirror.log");
        let mut writer = RotatingFile::open(&log, LIMIT, 1).unwrap();
        writer.write_all(b"hello\n").unwrap();
        writer.flush().unwrap();
        assert_eq!(fs::read_to_string(&log).unwrap(), "hello\n");
    }
}
