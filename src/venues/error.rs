//! Venue adapter error types.

use thiserror::Error;

use crate::kv::KvError;
use crate::reconcile::ReconcileError;
use crate::rest::RestError;
use crate::stream::StreamError;

/// VenueError surfaces failures from a venue adapter's start/stop path and,
/// in steady state, from a dispatcher handler (spec.md §4.7, §7).
#[derive(Debug, Error)]
pub enum VenueError {
    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Rest(#[from] RestError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Kv(#[from] KvError),

    #[error("login did not complete within the allotted timeout")]
    LoginTimeout,

    #[error("login rejected: {0}")]
    LoginRejected(String),

    #[error("subscription failed: {0}")]
    Subscription(String),

    #[error("missing credential: {0}")]
    MissingCredential(String),
}
