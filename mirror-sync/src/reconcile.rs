//! Source → replica reconciliation.
//!
//! A pass runs in two ordered phases:
//!
//! 1. **Forward**: walk the source top-down; create missing directories and
//!    copy files that are absent or differ in the replica.
//! 2. **Reverse**: walk the replica children-first; delete every file and
//!    directory that has no counterpart in the source.
//!
//! The reverse phase starts only after the forward phase has finished.
//! Failures confined to one entry become `error` events and the pass goes on;
//! failures of the roots themselves abort the pass with a [`SyncError`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use walkdir::{DirEntry, WalkDir};

use mirror_core::{CompareMode, EntryKind, PassSummary, SyncEvent};

use crate::compare::compare_files;
use crate::copy::copy_atomic;
use crate::error::{io_err, SyncError};
use crate::sink::EventSink;

/// Knobs for a [`Reconciler`].
#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    pub compare: CompareMode,
    /// Descend into symlinked directories of the source.
    pub follow_links: bool,
    /// Checked between entries; a cancelled token ends the pass with
    /// [`SyncError::Cancelled`].
    pub cancel: Option<CancellationToken>,
}

/// Stateless one-way reconciler. Each call to [`Reconciler::run`] re-derives
/// everything from disk.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    options: ReconcileOptions,
}

/// Run one pass with default options.
pub fn reconcile(
    source_root: &Path,
    replica_root: &Path,
    sink: &dyn EventSink,
) -> Result<PassSummary, SyncError> {
    Reconciler::default().run(source_root, replica_root, sink)
}

/// Per-pass bookkeeping: forwards events and counts them.
struct Pass<'a> {
    sink: &'a dyn EventSink,
    summary: PassSummary,
}

impl Pass<'_> {
    fn emit(&mut self, event: SyncEvent) {
        self.summary.record(&event);
        self.sink.emit(event);
    }

    fn item_error(&mut self, path: &Path, err: impl std::fmt::Display) {
        self.emit(SyncEvent::error(path, err.to_string()));
    }
}

impl Reconciler {
    pub fn new(options: ReconcileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    /// Make `replica_root` match `source_root`.
    ///
    /// Returns the per-action counts of the pass. Per-item failures are in
    /// `summary.errors` and were reported to `sink`.
    pub fn run(
        &self,
        source_root: &Path,
        replica_root: &Path,
        sink: &dyn EventSink,
    ) -> Result<PassSummary, SyncError> {
        let started = Instant::now();
        let mut pass = Pass {
            sink,
            summary: PassSummary::default(),
        };

        ensure_source_root(source_root)?;
        self.ensure_replica_root(replica_root, &mut pass)?;
        self.forward(source_root, replica_root, &mut pass)?;

        // The source may have vanished while we were copying; pruning against
        // a missing source would empty the replica.
        ensure_source_root(source_root)?;
        self.reverse(source_root, replica_root, &mut pass)?;

        Ok(pass.summary.with_duration(started.elapsed()))
    }

    fn check_cancelled(&self) -> Result<(), SyncError> {
        match &self.options.cancel {
            Some(token) if token.is_cancelled() => Err(SyncError::Cancelled),
            _ => Ok(()),
        }
    }

    fn ensure_replica_root(&self, replica_root: &Path, pass: &mut Pass<'_>) -> Result<(), SyncError> {
        match fs::metadata(replica_root) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(SyncError::ReplicaRoot {
                path: replica_root.to_path_buf(),
                source: io::Error::new(io::ErrorKind::AlreadyExists, "not a directory"),
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                fs::create_dir_all(replica_root).map_err(|source| SyncError::ReplicaRoot {
                    path: replica_root.to_path_buf(),
                    source,
                })?;
                pass.emit(SyncEvent::directory_created(replica_root));
                Ok(())
            }
            Err(err) => Err(io_err(replica_root, err)),
        }
    }

    // -----------------------------------------------------------------------
    // Forward pass
    // -----------------------------------------------------------------------

    fn forward(&self, source_root: &Path, replica_root: &Path, pass: &mut Pass<'_>) -> Result<(), SyncError> {
        let walker = WalkDir::new(source_root)
            .follow_links(self.options.follow_links)
            .sort_by_file_name();

        for entry in walker {
            self.check_cancelled()?;

            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    walk_error(source_root, err, pass)?;
                    continue;
                }
            };
            if entry.depth() == 0 {
                continue;
            }

            let Some(target) = counterpart(entry.path(), source_root, replica_root) else {
                pass.item_error(entry.path(), "entry is outside the source root");
                continue;
            };

            match classify(&entry) {
                Ok(EntryKind::Directory) => sync_directory(&target, pass),
                Ok(EntryKind::File) => self.sync_file(entry.path(), &target, pass),
                Err(err) => pass.item_error(entry.path(), err),
            }
        }
        Ok(())
    }

    fn sync_file(&self, source: &Path, target: &Path, pass: &mut Pass<'_>) {
        // Whatever occupies the target must be a regular file before comparing.
        match fs::symlink_metadata(target) {
            Ok(meta) if meta.is_dir() => {
                if let Err(err) = fs::remove_dir_all(target) {
                    pass.item_error(target, err);
                    return;
                }
                pass.emit(SyncEvent::directory_deleted(target));
            }
            Ok(meta) if meta.file_type().is_symlink() => {
                if let Err(err) = fs::remove_file(target) {
                    pass.item_error(target, err);
                    return;
                }
                pass.emit(SyncEvent::file_deleted(target));
            }
            _ => {}
        }

        let outcome = match compare_files(source, target, self.options.compare) {
            Ok(outcome) => outcome,
            Err(err) => {
                pass.item_error(source, err);
                return;
            }
        };
        if !outcome.needs_copy() {
            tracing::trace!(path = %target.display(), "unchanged");
            return;
        }

        match copy_atomic(source, target) {
            Ok(()) => pass.emit(SyncEvent::file_copied(source, target)),
            Err(err) => pass.item_error(source, err),
        }
    }

    // -----------------------------------------------------------------------
    // Reverse pass
    // -----------------------------------------------------------------------

    fn reverse(&self, source_root: &Path, replica_root: &Path, pass: &mut Pass<'_>) -> Result<(), SyncError> {
        let walker = WalkDir::new(replica_root)
            .follow_links(false)
            .contents_first(true)
            .sort_by_file_name();

        for entry in walker {
            self.check_cancelled()?;

            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    walk_error(replica_root, err, pass)?;
                    continue;
                }
            };
            if entry.depth() == 0 {
                continue;
            }

            let Some(source_path) = counterpart(entry.path(), replica_root, source_root) else {
                pass.item_error(entry.path(), "entry is outside the replica root");
                continue;
            };

            match source_path.try_exists() {
                Ok(true) => continue,
                Ok(false) => {}
                Err(err) => {
                    pass.item_error(&source_path, err);
                    continue;
                }
            }

            // A missing counterpart only means "orphan" while the root is there.
            ensure_source_root(source_root)?;

            let replica = entry.path();
            if entry.file_type().is_dir() {
                match fs::remove_dir(replica) {
                    Ok(()) => pass.emit(SyncEvent::directory_deleted(replica)),
                    Err(err) => pass.item_error(replica, err),
                }
            } else {
                match fs::remove_file(replica) {
                    Ok(()) => pass.emit(SyncEvent::file_deleted(replica)),
                    Err(err) => pass.item_error(replica, err),
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ensure_source_root(source_root: &Path) -> Result<(), SyncError> {
    match fs::metadata(source_root) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(SyncError::SourceUnavailable {
            path: source_root.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
        }),
        Err(source) => Err(SyncError::SourceUnavailable {
            path: source_root.to_path_buf(),
            source,
        }),
    }
}

fn sync_directory(target: &Path, pass: &mut Pass<'_>) {
    match fs::symlink_metadata(target) {
        Ok(meta) if meta.is_dir() => return,
        Ok(_) => {
            if let Err(err) = fs::remove_file(target) {
                pass.item_error(target, err);
                return;
            }
            pass.emit(SyncEvent::file_deleted(target));
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            pass.item_error(target, err);
            return;
        }
    }

    match fs::create_dir_all(target) {
        Ok(()) => pass.emit(SyncEvent::directory_created(target)),
        Err(err) => pass.item_error(target, err),
    }
}

/// Map `path` under `from_root` to the same relative path under `to_root`.
fn counterpart(path: &Path, from_root: &Path, to_root: &Path) -> Option<PathBuf> {
    path.strip_prefix(from_root).ok().map(|rel| to_root.join(rel))
}

/// Directory or file. Symlinks are classified by their target; dangling
/// links and special files are per-item errors.
fn classify(entry: &DirEntry) -> io::Result<EntryKind> {
    let file_type = entry.file_type();
    if file_type.is_dir() {
        return Ok(EntryKind::Directory);
    }
    if file_type.is_file() {
        return Ok(EntryKind::File);
    }
    if file_type.is_symlink() {
        let meta = fs::metadata(entry.path())?;
        if meta.is_dir() {
            return Ok(EntryKind::Directory);
        }
        if meta.is_file() {
            return Ok(EntryKind::File);
        }
    }
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "unsupported file type",
    ))
}

/// Walk errors at the root abort the pass; anything deeper is per-item.
fn walk_error(root: &Path, err: walkdir::Error, pass: &mut Pass<'_>) -> Result<(), SyncError> {
    if err.depth() == 0 {
        return Err(SyncError::Walk {
            path: root.to_path_buf(),
            source: err,
        });
    }
    let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
    pass.item_error(&path, err);
    Ok(())
}
