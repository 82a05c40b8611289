//! Tracing setup: human-readable console output plus a durable JSON-lines log.
//!
//! Both outputs stamp records with [`UtcSeconds`] (`YYYY-MM-DDTHH:MM:SSZ`).
//! The level filter comes from `RUST_LOG` and defaults to `info`.

use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tfmt, EnvFilter};

use mirror_core::types::format_timestamp;
use mirror_core::MirrorConfig;

use crate::error::DaemonError;
use crate::log_rotation::RotatingFile;

/// Where and how large the durable log may grow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub path: PathBuf,
    pub max_bytes: u64,
    pub max_files: usize,
}

impl From<&MirrorConfig> for LogSettings {
    fn from(cfg: &MirrorConfig) -> Self {
        Self {
            path: cfg.log_file.clone(),
            max_bytes: cfg.max_log_bytes,
            max_files: cfg.max_archived_logs,
        }
    }
}

/// Timer rendering the current UTC time with whole-second precision.
#[derive(Debug, Clone, Copy, Default)]
pub struct UtcSeconds;

impl FormatTime for UtcSeconds {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", format_timestamp(&Utc::now()))
    }
}

/// Install the global subscriber: console on stdout, JSON lines in the
/// rotating log file.
pub fn init_logging(settings: &LogSettings) -> Result<(), DaemonError> {
    let file = RotatingFile::open(&settings.path, settings.max_bytes, settings.max_files)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console = tfmt::layer().with_timer(UtcSeconds).with_target(false);
    let durable = tfmt::layer()
        .json()
        .with_timer(UtcSeconds)
        .with_target(false)
        .with_current_span(false)
        .with_span_list(false)
        .flatten_event(true)
        .with_ansi(false)
        .with_writer(Mutex::new(file));

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(durable)
        .try_init()
        .map_err(|err| DaemonError::Logging(err.to_string()))
}
