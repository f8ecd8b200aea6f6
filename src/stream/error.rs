//! Streaming client error types.

use thiserror::Error;

/// StreamError represents failures from `StreamClient` (spec.md §4.3).
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("already connected")]
    AlreadyConnected,

    #[error("dial failed: {0}")]
    Dial(String),

    #[error("dial timed out")]
    DialTimeout,

    #[error("session is closed")]
    Closed,

    #[error("timed out waiting for reader/writer to terminate")]
    CloseTimeout,
}
