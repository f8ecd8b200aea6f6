//! Top-level error aggregation for the process entry point.

use thiserror::Error;

use crate::config::ConfigError;
use crate::kv::KvError;
use crate::rest::RestError;
use crate::stream::StreamError;
use crate::synchroniser::SupervisorError;
use crate::venues::VenueError;

/// MarketsyncError aggregates every component error for `main`'s `Result` return type.
#[derive(Debug, Error)]
pub enum MarketsyncError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Kv(#[from] KvError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Rest(#[from] RestError),

    #[error(transparent)]
    Venue(#[from] VenueError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}
