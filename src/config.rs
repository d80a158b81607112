use std::time::Duration;

use crate::device::Accuracy;

/// Endpoints and tuning knobs shared by the controllers and the HTTP clients.
#[derive(Debug, Clone)]
pub struct Config {
    /// Where reviews are POSTed.
    pub submit_url: String,
    /// Geocoder search endpoint.
    pub geocoder_url: String,
    /// `countrycodes` restriction passed to the geocoder.
    pub country_codes: String,
    /// Quiet period before a typed query is looked up.
    pub debounce: Duration,
    /// Queries up to this many characters are never looked up.
    pub min_query_chars: usize,
    /// `User-Agent` sent with every request.
    pub user_agent: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Whether a successful submission also forgets the selected location.
    pub clear_location_on_success: bool,
    /// Precision asked of the device when locating it.
    pub geolocation_accuracy: Accuracy,
}

impl Config {
    /// Default review endpoint.
    pub const SUBMIT_URL: &str = "https://yashdb18-hersafety.hf.space/app/save_review";
    /// Default geocoder endpoint.
    pub const GEOCODER_URL: &str = "https://nominatim.openstreetmap.org/search";
}

impl Default for Config {
    fn default() -> Self {
        Self {
            submit_url: Self::SUBMIT_URL.to_string(),
            geocoder_url: Self::GEOCODER_URL.to_string(),
            country_codes: "in".to_string(),
            debounce: Duration::from_millis(300),
            min_query_chars: 2,
            user_agent: concat!("safety-report/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout: Duration::from_secs(30),
            clear_location_on_success: true,
            geolocation_accuracy: Accuracy::High,
        }
    }
}
