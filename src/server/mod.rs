use core::future::Future;

use anyhow::Result;

use crate::{
    error::SubmitError,
    protocol::{ReviewPayload, SearchCandidate},
};

mod nominatim;
mod review;

pub use nominatim::NominatimGeocoder;
pub use review::{ReviewEndpoint, ReviewReceipt, ReviewResponse};

/// Free-text location search.
pub trait Geocoder: Send + Sync + 'static {
    /// Look up candidates matching `query`.
    fn search(&self, query: &str) -> impl Future<Output = Result<Vec<SearchCandidate>>> + Send;
}

/// Somewhere a review can be delivered to.
pub trait ReportSink: Send + Sync {
    /// Deliver one review and hand back the raw answer. Exactly one attempt is made.
    fn send(
        &self,
        payload: &ReviewPayload,
    ) -> impl Future<Output = Result<ReviewResponse, SubmitError>> + Send;
}
