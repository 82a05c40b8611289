//! Domain types for mirror passes.
//!
//! A pass reports everything it does to the replica as a stream of
//! [`SyncEvent`]s. Timestamps are always UTC and render as
//! `YYYY-MM-DDTHH:MM:SSZ`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `strftime` pattern used for every timestamp the mirror emits.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Render `ts` in the canonical `YYYY-MM-DDTHH:MM:SSZ` form.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Kind of a tree entry. Anything the walk yields is classified as one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Directory,
    File,
}

/// Severity of a [`SyncEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// What happened to the replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncAction {
    DirectoryCreated,
    FileCopied,
    FileDeleted,
    DirectoryDeleted,
    Error,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::DirectoryCreated => "directory-created",
            SyncAction::FileCopied => "file-copied",
            SyncAction::FileDeleted => "file-deleted",
            SyncAction::DirectoryDeleted => "directory-deleted",
            SyncAction::Error => "error",
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SyncEvent
// ---------------------------------------------------------------------------

/// One immutable record of a replica mutation or a per-item failure.
///
/// `path` is the replica path for create/copy/delete actions and the
/// offending path for errors. `source` is set when a source path applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEvent {
    #[serde(with = "utc_seconds")]
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub action: SyncAction,
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SyncEvent {
    fn info(action: SyncAction, path: &Path, source: Option<&Path>) -> Self {
        Self {
            timestamp: Utc::now(),
            severity: Severity::Info,
            action,
            path: path.to_path_buf(),
            source: source.map(Path::to_path_buf),
            message: None,
        }
    }

    pub fn directory_created(replica: &Path) -> Self {
        Self::info(SyncAction::DirectoryCreated, replica, None)
    }

    pub fn file_copied(source: &Path, replica: &Path) -> Self {
        Self::info(SyncAction::FileCopied, replica, Some(source))
    }

    pub fn file_deleted(replica: &Path) -> Self {
        Self::info(SyncAction::FileDeleted, replica, None)
    }

    pub fn directory_deleted(replica: &Path) -> Self {
        Self::info(SyncAction::DirectoryDeleted, replica, None)
    }

    /// A per-item failure. The pass that produced it carries on.
    pub fn error(path: &Path, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            severity: Severity::Error,
            action: SyncAction::Error,
            path: path.to_path_buf(),
            source: None,
            message: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            format_timestamp(&self.timestamp),
            self.severity,
            self.action,
            self.path.display()
        )?;
        if let Some(source) = &self.source {
            write!(f, " (from {})", source.display())?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PassSummary
// ---------------------------------------------------------------------------

/// Per-action counts for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub directories_created: usize,
    pub files_copied: usize,
    pub files_deleted: usize,
    pub directories_deleted: usize,
    pub errors: usize,
    pub duration_ms: u128,
}

impl PassSummary {
    pub fn record(&mut self, event: &SyncEvent) {
        match event.action {
            SyncAction::DirectoryCreated => self.directories_created += 1,
            SyncAction::FileCopied => self.files_copied += 1,
            SyncAction::FileDeleted => self.files_deleted += 1,
            SyncAction::DirectoryDeleted => self.directories_deleted += 1,
            SyncAction::Error => self.errors += 1,
        }
    }

    pub fn with_duration(mut self, elapsed: Duration) -> Self {
        self.duration_ms = elapsed.as_millis();
        self
    }

    /// Number of replica mutations (errors excluded).
    pub fn changes(&self) -> usize {
        self.directories_created + self.files_copied + self.files_deleted + self.directories_deleted
    }

    pub fn is_clean(&self) -> bool {
        self.changes() == 0 && self.errors == 0
    }
}

/// Serde adapter for `YYYY-MM-DDTHH:MM:SSZ` timestamps.
pub mod utc_seconds {
    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{format_timestamp, TIMESTAMP_FORMAT};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamp_renders_utc_seconds_with_z_suffix() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(format_timestamp(&ts), "2024-03-09T07:05:01Z");
    }

    #[test]
    fn event_serializes_kebab_case_action_and_compact_timestamp() {
        let mut event = SyncEvent::file_copied(Path::new("/src/a.txt"), Path::new("/dst/a.txt"));
        event.timestamp = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["action"], "file-copied");
        assert_eq!(json["severity"], "info");
        assert_eq!(json["timestamp"], "2024-01-02T03:04:05Z");
        assert_eq!(json["source"], "/src/a.txt");
        assert!(json.get("message").is_none());

        let back: SyncEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn error_event_carries_message_and_error_severity() {
        let event = SyncEvent::error(Path::new("/dst/x"), "permission denied");
        assert!(event.is_error());
        assert_eq!(event.action, SyncAction::Error);
        assert!(event.to_string().ends_with("ERROR error /dst/x: permission denied"));
    }

    #[test]
    fn summary_counts_each_action() {
        let mut summary = PassSummary::default();
        summary.record(&SyncEvent::directory_created(Path::new("/d")));
        summary.record(&SyncEvent::file_copied(Path::new("/s"), Path::new("/d/f")));
        summary.record(&SyncEvent::file_copied(Path::new("/s"), Path::new("/d/g")));
        summary.record(&SyncEvent::error(Path::new("/d/h"), "boom"));

        assert_eq!(summary.directories_created, 1);
        assert_eq!(summary.files_copied, 2);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.changes(), 3);
        assert!(!summary.is_clean());
        assert!(PassSummary::default().is_clean());
    }
}
