//! Mirror core library: domain types, configuration, errors.
//!
//! Public API surface:
//! - [`types`]: sync events, actions, per-pass summaries
//! - [`config`]: layered configuration and validation
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{CompareMode, FileConfig, MirrorConfig};
pub use error::ConfigError;
pub use types::{EntryKind, PassSummary, Severity, SyncAction, SyncEvent};
