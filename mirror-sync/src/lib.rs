//! # mirror-sync
//!
//! One-way tree reconciliation.
//!
//! Call [`reconcile`] to make a replica tree match a source tree in a single
//! pass, or build a [`Reconciler`] with [`ReconcileOptions`] to pick the
//! comparison policy, link handling and cancellation.

pub mod compare;
pub mod copy;
pub mod error;
pub mod reconcile;
pub mod sink;

pub use error::SyncError;
pub use reconcile::{reconcile, ReconcileOptions, Reconciler};
pub use sink::{EventSink, RecordingSink, TracingSink};
