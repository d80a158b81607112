use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use super::Location;

/// A possible match for a free-text query, as returned by the geocoder.
///
/// Coordinates stay textual until the candidate is actually picked.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct SearchCandidate {
    /// Latitude, as text.
    pub lat: String,
    /// Longitude, as text.
    pub lon: String,
    /// Human-readable name shown in the candidate list.
    pub display_name: String,
}

impl SearchCandidate {
    /// Parse the textual coordinates into a [`Location`].
    pub fn to_location(&self) -> Result<Location> {
        let lat = self
            .lat
            .trim()
            .parse::<f64>()
            .with_context(|| format!("bad latitude `{}` for {}", self.lat, self.display_name))?;
        let lng = self
            .lon
            .trim()
            .parse::<f64>()
            .with_context(|| format!("bad longitude `{}` for {}", self.lon, self.display_name))?;

        let location = Location { lat, lng };
        if !location.is_valid() {
            bail!("coordinates out of range for {}: {location}", self.display_name);
        }

        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(lat: &str, lon: &str) -> SearchCandidate {
        SearchCandidate {
            lat: lat.to_string(),
            lon: lon.to_string(),
            display_name: "Bangalore, India".to_string(),
        }
    }

    #[test]
    fn test_to_location_is_exact_parse() {
        let location = candidate("12.9767936", "77.590082").to_location().unwrap();

        assert_eq!(location.lat, "12.9767936".parse::<f64>().unwrap());
        assert_eq!(location.lng, "77.590082".parse::<f64>().unwrap());
    }

    #[test]
    fn test_to_location_rejects_garbage() {
        assert!(candidate("twelve", "77.59").to_location().is_err());
        assert!(candidate("12.97", "").to_location().is_err());
        assert!(candidate("NaN", "77.59").to_location().is_err());
        assert!(candidate("12.97", "inf").to_location().is_err());
        assert!(candidate("95.0", "77.59").to_location().is_err());
    }

    #[test]
    fn test_deserialize_geocoder_entry() {
        let body = r#"{"place_id":1,"lat":"12.97","lon":"77.59","display_name":"Bangalore, India","importance":0.7}"#;
        let parsed: SearchCandidate = serde_json::from_str(body).unwrap();

        assert_eq!(parsed, candidate("12.97", "77.59"));
    }
}
