use anyhow::{Context, Result};
use reqwest::Url;

use crate::protocol::Location;

/// User id reported when the launch URL names nobody.
pub const ANONYMOUS_USER_ID: &str = "00000000-0000-0000-0000-000000000000";

/// State carried in the URL the report page was opened with.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchParams {
    /// Who is reporting.
    pub user_id: String,
    /// Location to start from, when both `lat` and `lng` were given.
    pub initial_location: Option<Location>,
}

impl Default for LaunchParams {
    fn default() -> Self {
        Self {
            user_id: ANONYMOUS_USER_ID.to_string(),
            initial_location: None,
        }
    }
}

impl LaunchParams {
    /// Read the user and the optional starting point out of a report page URL.
    ///
    /// Accepts `.../report?userID=<id>` and `.../report/<id>?lat=<lat>&lng=<lng>`.
    /// A user id in the path is percent-decoded, like one in the query.
    /// Relative URLs are resolved against a dummy origin.
    pub fn from_url(url: &str) -> Result<Self> {
        let url = match Url::parse(url) {
            Ok(url) => url,
            Err(_) => Url::parse("http://localhost/")?
                .join(url)
                .with_context(|| format!("not a report URL: {url}"))?,
        };

        let mut user_id = None;
        let mut lat = None;
        let mut lng = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "userID" if !value.is_empty() => user_id = Some(value.into_owned()),
                "lat" => lat = parse_coordinate(&value),
                "lng" => lng = parse_coordinate(&value),
                _ => {}
            }
        }

        let user_id = user_id
            .or_else(|| {
                let mut segments = url.path_segments()?;
                segments.find(|segment| *segment == "report")?;
                let segment = segments.next().filter(|segment| !segment.is_empty())?;
                match urlencoding::decode(segment) {
                    Ok(decoded) => Some(decoded.into_owned()),
                    Err(e) => {
                        log::warn!("keeping undecodable user id `{segment}`: {e}");
                        Some(segment.to_string())
                    }
                }
            })
            .unwrap_or_else(|| ANONYMOUS_USER_ID.to_string());

        let initial_location = match (lat, lng) {
            (Some(lat), Some(lng)) => Some(Location::new(lat, lng)).filter(Location::is_valid),
            _ => None,
        };

        Ok(Self {
            user_id,
            initial_location,
        })
    }
}

/// Zero and non-numbers count as absent.
fn parse_coordinate(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v != 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_from_query() {
        let params = LaunchParams::from_url("https://example.org/report?userID=abc-123").unwrap();

        assert_eq!(params.user_id, "abc-123");
        assert_eq!(params.initial_location, None);
    }

    #[test]
    fn test_user_and_location_from_path() {
        let params =
            LaunchParams::from_url("https://example.org/report/u-42?lat=12.9716&lng=77.5946").unwrap();

        assert_eq!(params.user_id, "u-42");
        assert_eq!(params.initial_location, Some(Location::new(12.9716, 77.5946)));
    }

    #[test]
    fn test_user_from_path_is_decoded() {
        let params = LaunchParams::from_url("https://example.org/report/a%20b").unwrap();
        assert_eq!(params.user_id, "a b");

        let params = LaunchParams::from_url("/report/r%C3%A9ka%2F1").unwrap();
        assert_eq!(params.user_id, "réka/1");

        // not UTF-8 once decoded
        let params = LaunchParams::from_url("/report/u%FF").unwrap();
        assert_eq!(params.user_id, "u%FF");
    }

    #[test]
    fn test_relative_url() {
        let params = LaunchParams::from_url("/report/u-7").unwrap();

        assert_eq!(params.user_id, "u-7");
    }

    #[test]
    fn test_defaults_to_anonymous() {
        let params = LaunchParams::from_url("https://example.org/report").unwrap();

        assert_eq!(params, LaunchParams::default());
    }

    #[test]
    fn test_partial_or_zero_location_is_ignored() {
        let only_lat = LaunchParams::from_url("/report/u?lat=12.97").unwrap();
        assert_eq!(only_lat.initial_location, None);

        let zero = LaunchParams::from_url("/report/u?lat=0&lng=77.59").unwrap();
        assert_eq!(zero.initial_location, None);

        let garbage = LaunchParams::from_url("/report/u?lat=abc&lng=77.59").unwrap();
        assert_eq!(garbage.initial_location, None);
    }
}
