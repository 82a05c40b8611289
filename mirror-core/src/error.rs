//! Error types for mirror-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure while reading a config file or probing a path.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A required setting was supplied by none of the layers.
    #[error("missing required setting `{field}`")]
    Missing { field: &'static str },

    #[error("sync interval must be a positive number of seconds")]
    InvalidInterval,

    #[error("source folder does not exist: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("source path is not a directory: {path}")]
    SourceNotDirectory { path: PathBuf },

    /// Source and replica are the same tree or one contains the other.
    #[error("source {source_root} and replica {replica_root} must not overlap")]
    OverlappingRoots {
        source_root: PathBuf,
        replica_root: PathBuf,
    },

    /// The reverse pass would delete a log file living inside the replica.
    #[error("log file {path} must not live inside the replica folder")]
    LogInsideReplica { path: PathBuf },

    #[error("max log bytes must be greater than zero")]
    InvalidLogLimit,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
