use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the scheduler runtime and logging setup.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sync error: {0}")]
    Sync(#[from] mirror_sync::SyncError),

    #[error("task join failure: {0}")]
    Join(String),

    #[error("signal handler failed: {0}")]
    Signal(String),

    #[error("logging setup failed: {0}")]
    Logging(String),
}

impl DaemonError {
    /// True when the error only reports that a pass observed cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DaemonError::Sync(err) if err.is_cancelled())
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
