//! Error types for mirror-sync.
//!
//! Only pass-fatal failures surface as [`SyncError`]; per-item failures are
//! reported to the sink as `error` events and never reach the caller.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a reconciliation pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The source root is missing, unreadable, or no longer a directory.
    #[error("source root unavailable at {path}: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The replica root could not be created or is not a directory.
    #[error("replica root unusable at {path}: {source}")]
    ReplicaRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A tree walk failed at its root.
    #[error("cannot walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The pass observed a cancellation request and stopped early.
    #[error("pass cancelled")]
    Cancelled,
}

impl SyncError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
