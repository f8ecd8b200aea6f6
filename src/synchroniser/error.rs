//! Synchroniser supervisor error types.

use thiserror::Error;

use crate::venues::VenueError;

/// SupervisorError surfaces failures from [`super::Synchroniser`]'s
/// start/stop path (spec.md §4.8).
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("synchroniser is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Venue(#[from] VenueError),
}
