//! Request/response client error types.

use thiserror::Error;

/// RestError represents failures from [`super::RestClient::call`] (spec.md §4.4).
#[derive(Debug, Error)]
pub enum RestError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("non-2xx response ({status}): {body}")]
    Status { status: reqwest::StatusCode, body: String },

    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),
}
