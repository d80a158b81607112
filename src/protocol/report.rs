use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::error::SubmitError;

use super::Location;

/// A safety rating on a 1 to 5 star scale.
#[derive(Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    /// Lowest accepted rating.
    pub const MIN: u8 = 1;
    /// Highest accepted rating.
    pub const MAX: u8 = 5;

    /// The number of stars.
    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            bail!(
                "rating must be between {} and {}, got {value}",
                Self::MIN,
                Self::MAX
            );
        }
        Ok(Self(value))
    }
}

impl From<Rating> for u8 {
    fn from(value: Rating) -> Self {
        value.0
    }
}

/// The in-progress report, snapshotted from the form right before submitting.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct ReportDraft {
    /// Identifier of the reporting user.
    pub user_id: String,
    /// Free-text description of the place.
    pub description: String,
    /// The selected location, if any.
    pub location: Option<Location>,
    /// Star rating; `0` means not rated yet.
    pub rating: u8,
}

impl ReportDraft {
    /// Check completeness and build the wire payload.
    ///
    /// Nothing is sent for a draft that fails this check.
    pub fn to_payload(&self) -> Result<ReviewPayload, SubmitError> {
        let location = self.location.ok_or(SubmitError::Incomplete)?;
        if self.description.is_empty() || !location.is_valid() {
            return Err(SubmitError::Incomplete);
        }
        let rating = Rating::try_from(self.rating).map_err(|_| SubmitError::Incomplete)?;

        Ok(ReviewPayload {
            user_id: self.user_id.clone(),
            description: self.description.clone(),
            latitude: location.lat,
            longitude: location.lng,
            rating,
        })
    }

    /// Forget everything the user typed or picked, keeping the identity.
    pub(crate) fn reset(&mut self, clear_location: bool) {
        self.description.clear();
        self.rating = 0;
        if clear_location {
            self.location = None;
        }
    }
}

/// Body of the review submission request.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct ReviewPayload {
    /// Reporting user.
    #[serde(rename = "userid")]
    pub user_id: String,
    /// Free-text description.
    pub description: String,
    /// Latitude of the reviewed place.
    #[serde(rename = "latt")]
    pub latitude: f64,
    /// Longitude of the reviewed place.
    #[serde(rename = "long")]
    pub longitude: f64,
    /// Star rating.
    pub rating: Rating,
}
