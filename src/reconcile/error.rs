//! Reconciler error types.

use thiserror::Error;

use crate::kv::KvError;

/// ReconcileError surfaces failures from the order-book reconciler
/// (spec.md §4.5). Constructed rarely: resync failures surface to the
/// caller as whatever the snapshot fetcher returned.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Kv(#[from] KvError),

    #[error("snapshot fetch failed: {0}")]
    SnapshotFetch(String),
}
