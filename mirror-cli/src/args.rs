//! Command-line arguments and their merge with the config file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use mirror_core::{config, CompareMode, FileConfig, MirrorConfig};

/// Arguments for `mirror`.
///
/// The four positionals may be omitted when a `--config` file or the
/// matching `MIRROR_*` environment variable supplies them.
#[derive(Parser, Debug)]
#[command(
    name = "mirror",
    version,
    about = "Periodically mirror a source folder onto a replica folder",
    long_about = None,
)]
pub struct MirrorArgs {
    /// Source folder path, e.g. '/Users/JohnDoe/Documents/source'.
    #[arg(env = "MIRROR_SOURCE")]
    pub source: Option<PathBuf>,

    /// Replica folder path, e.g. '/Users/JohnDoe/Documents/source_replica'.
    #[arg(env = "MIRROR_REPLICA")]
    pub replica: Option<PathBuf>,

    /// Synchronization interval in seconds, e.g. '5' syncs every 5 seconds.
    #[arg(env = "MIRROR_INTERVAL")]
    pub interval: Option<u64>,

    /// Path to the durable log file, e.g. '/Users/JohnDoe/Documents/mirror.log'.
    #[arg(env = "MIRROR_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// YAML file with defaults for any of the settings above.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Rotate the log file once it would grow past this many bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_log_bytes: Option<u64>,

    /// Number of rotated log files to keep (0 disables rotation).
    #[arg(long, value_name = "COUNT")]
    pub max_archived_logs: Option<usize>,

    /// How files are compared: content (SHA-256) or metadata (size + mtime).
    #[arg(long, value_name = "MODE")]
    pub compare: Option<CompareMode>,

    /// Descend into symlinked directories of the source.
    #[arg(long)]
    pub follow_links: bool,

    /// Run a single pass and exit.
    #[arg(long)]
    pub once: bool,
}

impl MirrorArgs {
    /// The settings given on the command line (or via environment).
    fn layer(&self) -> FileConfig {
        FileConfig {
            source: self.source.clone(),
            replica: self.replica.clone(),
            interval_secs: self.interval,
            log_file: self.log_file.clone(),
            max_log_bytes: self.max_log_bytes,
            max_archived_logs: self.max_archived_logs,
            compare: self.compare,
            follow_links: self.follow_links.then_some(true),
        }
    }

    /// Merge config file and arguments, apply defaults, and validate.
    pub fn resolve(&self) -> Result<MirrorConfig> {
        let base = match &self.config {
            Some(path) => config::load_file_at(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => FileConfig::default(),
        };

        let resolved = base.merge(self.layer()).resolve()?;
        resolved.validate()?;
        Ok(resolved)
    }
}
