use anyhow::Result;
use reqwest::Client;

use crate::{config::Config, protocol::SearchCandidate};

use super::Geocoder;

/// Search client for a Nominatim-compatible geocoder.
pub struct NominatimGeocoder {
    client: Client,
    endpoint: String,
    country_codes: String,
}

impl NominatimGeocoder {
    /// Client for `config.geocoder_url`, restricted to `config.country_codes`.
    pub fn new(config: &Config) -> Result<Self> {
        // nominatim rejects requests without a user agent
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.geocoder_url.clone(),
            country_codes: config.country_codes.clone(),
        })
    }
}

impl Geocoder for NominatimGeocoder {
    async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>> {
        let request = self.client.get(&self.endpoint).query(&[
            ("format", "json"),
            ("q", query),
            ("countrycodes", self.country_codes.as_str()),
        ]);

        let response = request.send().await?.error_for_status()?;
        let candidates: Vec<SearchCandidate> = response.json().await?;

        log::debug!("geocoder: {} candidates for {query:?}", candidates.len());

        Ok(candidates)
    }
}
