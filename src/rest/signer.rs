//! Per-venue request signing strategy (spec.md §4.4, §6).

use chrono::{DateTime, Utc};

/// Everything a [`super::signer::Signer`] needs to compute a signature and
/// the headers that carry it.
pub struct SignContext<'a> {
    pub now: DateTime<Utc>,
    pub method: &'a str,
    pub path: &'a str,
    pub query: &'a str,
    pub body: &'a str,
}

/// Extra headers a signed request must carry, in insertion order.
pub struct SignedHeaders(pub Vec<(String, String)>);

/// Venue-specific signing strategy for [`super::RestClient`].
pub trait Signer: Send + Sync {
    fn sign(&self, ctx: &SignContext) -> SignedHeaders;
}
