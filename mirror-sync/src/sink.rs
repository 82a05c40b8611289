//! Event sinks: where a pass reports what it did.
//!
//! The reconciler never logs on its own; every replica mutation and every
//! per-item failure goes through the [`EventSink`] handed to it.

use std::sync::{Arc, Mutex, MutexGuard};

use mirror_core::{Severity, SyncAction, SyncEvent};

/// Receiver of [`SyncEvent`]s.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SyncEvent);
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn emit(&self, event: SyncEvent) {
        (**self).emit(event);
    }
}

// ---------------------------------------------------------------------------
// TracingSink
// ---------------------------------------------------------------------------

/// Forwards events to `tracing` with structured `action` / `path` / `source`
/// / `error` fields. Whatever subscriber is installed decides where they land.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: SyncEvent) {
        let path = event.path.display();
        match (event.severity, &event.source) {
            (Severity::Error, _) => {
                let error = event.message.as_deref().unwrap_or("unknown error");
                tracing::error!(
                    action = event.action.as_str(),
                    path = %path,
                    error = %error,
                    "{}: {}",
                    path,
                    error
                );
            }
            (Severity::Info, Some(source)) => {
                tracing::info!(
                    action = event.action.as_str(),
                    path = %path,
                    source = %source.display(),
                    "{} {}",
                    event.action,
                    path
                );
            }
            (Severity::Info, None) => {
                tracing::info!(
                    action = event.action.as_str(),
                    path = %path,
                    "{} {}",
                    event.action,
                    path
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingSink
// ---------------------------------------------------------------------------

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SyncEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events.
    pub fn events(&self) -> Vec<SyncEvent> {
        self.lock().clone()
    }

    /// Drain the recorded events.
    pub fn take(&self) -> Vec<SyncEvent> {
        std::mem::take(&mut *self.lock())
    }

    /// Drain as `(action, path)` pairs, the shape most assertions want.
    pub fn take_actions(&self) -> Vec<(SyncAction, std::path::PathBuf)> {
        self.take()
            .into_iter()
            .map(|event| (event.action, event.path))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SyncEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: SyncEvent) {
        self.lock().push(event);
    }
}
