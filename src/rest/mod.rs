//! Signed synchronous request/response client (spec.md §4.4).
//!
//! Generalises the teacher's `exchanges::poloniex::client::Client` (itself
//! built on `reqwest`) by factoring venue-specific HMAC signing out behind a
//! [`Signer`] strategy, since OKX and Gate.io each sign requests
//! differently (spec.md §6). No retries — the teacher's Poloniex client's
//! rate-limit pacing is venue-local and not part of either venue's
//! documented contract here (SPEC_FULL.md §4.4).

mod error;
mod signer;

pub use error::RestError;
pub use signer::{SignContext, SignedHeaders, Signer};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::{Client as HttpClient, Method};
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Signed HTTP request/response client for one venue's REST surface.
pub struct RestClient {
    http: HttpClient,
    base_url: String,
    signer: Arc<dyn Signer>,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>, signer: Arc<dyn Signer>) -> Self {
        Self {
            http: HttpClient::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("failed to build http client"),
            base_url: base_url.into(),
            signer,
        }
    }

    /// Issues one signed call. `params` becomes the query string (spec.md
    /// §4.4: `k=v` pairs joined by `&`, empty when absent). `body`, when
    /// present, is sent as the raw request payload. Accepts HTTP
    /// 200/201/202; anything else becomes [`RestError::Status`].
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        body: Option<&str>,
    ) -> Result<Vec<u8>, RestError> {
        let query = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");

        let payload = body.unwrap_or("");
        let now = Utc::now();

        let ctx = SignContext {
            now,
            method: method.as_str(),
            path,
            query: &query,
            body: payload,
        };
        let SignedHeaders(headers) = self.signer.sign(&ctx);

        let url = if query.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query)
        };

        let mut request = self.http.request(method.clone(), &url);
        if let Some(body) = body {
            request = request
                .header("Content-Type", "application/json")
                .body(body.to_string());
        }
        for (key, value) in headers {
            request = request.header(key, value);
        }

        debug!(method = %method, url = %url, "sending rest call");

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        match status.as_u16() {
            200 | 201 | 202 => Ok(bytes.to_vec()),
            _ => Err(RestError::Status {
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            }),
        }
    }
}
