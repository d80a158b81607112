use core::fmt;

use serde::{Deserialize, Serialize};

/// A point picked on the map, by search, or by the device.
///
/// Locations carry no identity beyond their coordinates and are always replaced
/// wholesale, never patched field by field.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Copy)]
pub struct Location {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lng: f64,
}

impl Location {
    /// Where the map sits while nothing is selected (Bangalore).
    pub const DEFAULT_MAP_CENTER: Location = Location {
        lat: 12.9716,
        lng: 77.5946,
    };

    /// Construct a location from a latitude/longitude pair.
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Whether both coordinates are finite and inside the valid degree ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}, {:.5}", self.lat, self.lng)
    }
}

impl core::str::FromStr for Location {
    type Err = anyhow::Error;

    /// Parse `"<lat>,<lng>"`, as typed on the command line.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lng) = s
            .split_once(',')
            .ok_or_else(|| anyhow::anyhow!("expected `<lat>,<lng>`, got `{s}`"))?;

        let location = Location::new(lat.trim().parse()?, lng.trim().parse()?);
        if !location.is_valid() {
            anyhow::bail!("coordinates out of range: {location}");
        }

        Ok(location)
    }
}
