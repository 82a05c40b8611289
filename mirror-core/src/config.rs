//! Layered mirror configuration.
//!
//! # Precedence (lowest first)
//!
//! 1. Built-in defaults ([`DEFAULT_MAX_LOG_BYTES`], [`DEFAULT_MAX_ARCHIVED_LOGS`], …)
//! 2. Optional YAML file loaded with [`load_file_at`]
//! 3. Environment / command line, merged by the binary into a second [`FileConfig`]
//!
//! [`FileConfig::resolve`] fills defaults and reports missing settings;
//! [`MirrorConfig::validate`] checks the resolved values against the filesystem.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};

/// Rotate the durable log once it would grow past 10 MiB.
pub const DEFAULT_MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Keep at most 5 archived log files.
pub const DEFAULT_MAX_ARCHIVED_LOGS: usize = 5;

// ---------------------------------------------------------------------------
// CompareMode
// ---------------------------------------------------------------------------

/// How a replica file is judged identical to its source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareMode {
    /// Equal size and equal SHA-256 digest. Modification times are ignored.
    #[default]
    Content,
    /// Equal size and equal modification time (whole seconds).
    Metadata,
}

impl fmt::Display for CompareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareMode::Content => write!(f, "content"),
            CompareMode::Metadata => write!(f, "metadata"),
        }
    }
}

impl FromStr for CompareMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "content" => Ok(Self::Content),
            "metadata" => Ok(Self::Metadata),
            other => Err(format!(
                "unknown compare mode '{other}'; expected: content, metadata"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// FileConfig: one partial layer
// ---------------------------------------------------------------------------

/// A partial configuration layer. Every field is optional so layers can be
/// merged before defaults are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub source: Option<PathBuf>,
    #[serde(default)]
    pub replica: Option<PathBuf>,
    #[serde(default)]
    pub interval_secs: Option<u64>,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub max_log_bytes: Option<u64>,
    #[serde(default)]
    pub max_archived_logs: Option<usize>,
    #[serde(default)]
    pub compare: Option<CompareMode>,
    #[serde(default)]
    pub follow_links: Option<bool>,
}

impl FileConfig {
    /// Overlay `higher` on top of `self`; fields set in `higher` win.
    pub fn merge(self, higher: FileConfig) -> FileConfig {
        FileConfig {
            source: higher.source.or(self.source),
            replica: higher.replica.or(self.replica),
            interval_secs: higher.interval_secs.or(self.interval_secs),
            log_file: higher.log_file.or(self.log_file),
            max_log_bytes: higher.max_log_bytes.or(self.max_log_bytes),
            max_archived_logs: higher.max_archived_logs.or(self.max_archived_logs),
            compare: higher.compare.or(self.compare),
            follow_links: higher.follow_links.or(self.follow_links),
        }
    }

    /// Apply defaults and require the four settings that have none.
    pub fn resolve(self) -> Result<MirrorConfig, ConfigError> {
        Ok(MirrorConfig {
            source: self.source.ok_or(ConfigError::Missing { field: "source" })?,
            replica: self.replica.ok_or(ConfigError::Missing { field: "replica" })?,
            interval_secs: self
                .interval_secs
                .ok_or(ConfigError::Missing { field: "interval_secs" })?,
            log_file: self
                .log_file
                .ok_or(ConfigError::Missing { field: "log_file" })?,
            max_log_bytes: self.max_log_bytes.unwrap_or(DEFAULT_MAX_LOG_BYTES),
            max_archived_logs: self.max_archived_logs.unwrap_or(DEFAULT_MAX_ARCHIVED_LOGS),
            compare: self.compare.unwrap_or_default(),
            follow_links: self.follow_links.unwrap_or(false),
        })
    }
}

/// Load a YAML config layer from `path`.
///
/// Returns `ConfigError::Io` if the file cannot be read and
/// `ConfigError::Parse` (with path + line context) if malformed.
pub fn load_file_at(path: &Path) -> Result<FileConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    if contents.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// MirrorConfig: fully resolved
// ---------------------------------------------------------------------------

/// Fully resolved settings for one mirror process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MirrorConfig {
    pub source: PathBuf,
    pub replica: PathBuf,
    pub interval_secs: u64,
    pub log_file: PathBuf,
    pub max_log_bytes: u64,
    pub max_archived_logs: usize,
    pub compare: CompareMode,
    pub follow_links: bool,
}

impl MirrorConfig {
    /// Check the resolved settings against the filesystem.
    ///
    /// The source must be an existing directory; the replica may not exist
    /// yet but must not overlap the source; the log file must stay outside
    /// the replica.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        if self.max_log_bytes == 0 {
            return Err(ConfigError::InvalidLogLimit);
        }

        let meta = match std::fs::metadata(&self.source) {
            Ok(meta) => meta,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::SourceNotFound {
                    path: self.source.clone(),
                })
            }
            Err(err) => return Err(io_err(&self.source, err)),
        };
        if !meta.is_dir() {
            return Err(ConfigError::SourceNotDirectory {
                path: self.source.clone(),
            });
        }

        let source = std::fs::canonicalize(&self.source).map_err(|e| io_err(&self.source, e))?;
        let replica = normalize(&self.replica)?;
        if replica.starts_with(&source) || source.starts_with(&replica) {
            return Err(ConfigError::OverlappingRoots {
                source_root: self.source.clone(),
                replica_root: self.replica.clone(),
            });
        }

        let log_file = normalize(&self.log_file)?;
        if log_file.starts_with(&replica) {
            return Err(ConfigError::LogInsideReplica {
                path: self.log_file.clone(),
            });
        }

        Ok(())
    }
}

/// Absolute, symlink-resolved form of a path that may not exist yet.
///
/// Canonicalizes the deepest existing ancestor and re-appends the rest.
fn normalize(path: &Path) -> Result<PathBuf, ConfigError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| io_err(path, e))?
            .join(path)
    };

    let mut existing = absolute.as_path();
    let mut tail = Vec::new();
    loop {
        if existing.exists() {
            let mut resolved =
                std::fs::canonicalize(existing).map_err(|e| io_err(existing, e))?;
            for part in tail.iter().rev() {
                resolved.push(part);
            }
            return Ok(resolved);
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(absolute),
        }
    }
}
