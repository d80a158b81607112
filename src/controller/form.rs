use anyhow::{bail, Result};

use crate::{
    config::Config,
    launch::LaunchParams,
    protocol::{Rating, ReportDraft, SubmissionOutcome},
    server::{Geocoder, ReportSink},
};

use super::{LocationSelectionController, SubmissionController};

/// Everything on the report page: who is reporting, what they typed, where, and how it went.
pub struct ReportForm<G, S> {
    user_id: String,
    description: String,
    rating: u8,
    selection: LocationSelectionController<G>,
    submission: SubmissionController<S>,
}

impl<G: Geocoder, S: ReportSink> ReportForm<G, S> {
    /// Open the page for the user and starting point in `params`.
    pub fn new(params: LaunchParams, geocoder: G, sink: S, config: &Config) -> Self {
        Self {
            user_id: params.user_id,
            description: String::new(),
            rating: 0,
            selection: LocationSelectionController::new(geocoder, config, params.initial_location),
            submission: SubmissionController::new(sink, config),
        }
    }

    /// Who is reporting.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The description typed so far.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Replace the description.
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Current star rating; `0` when not rated.
    pub fn rating(&self) -> u8 {
        self.rating
    }

    /// Set the star rating; `0` clears it.
    pub fn set_rating(&mut self, rating: u8) -> Result<()> {
        if rating != 0 && Rating::try_from(rating).is_err() {
            bail!("rating must be between {} and {}", Rating::MIN, Rating::MAX);
        }
        self.rating = rating;
        Ok(())
    }

    /// The location picker.
    pub fn selection(&self) -> &LocationSelectionController<G> {
        &self.selection
    }

    /// The location picker, for feeding it user events.
    pub fn selection_mut(&mut self) -> &mut LocationSelectionController<G> {
        &mut self.selection
    }

    /// Submission state.
    pub fn submission(&self) -> &SubmissionController<S> {
        &self.submission
    }

    /// Snapshot of what would be submitted right now.
    pub fn draft(&self) -> ReportDraft {
        ReportDraft {
            user_id: self.user_id.clone(),
            description: self.description.clone(),
            location: self.selection.current_location(),
            rating: self.rating,
        }
    }

    /// Submit the current draft once and carry the post-success reset back into the form.
    pub async fn submit(&mut self) -> SubmissionOutcome {
        let mut draft = self.draft();
        let outcome = self.submission.submit(&mut draft).await;

        if outcome.is_success() {
            self.description = draft.description;
            self.rating = draft.rating;
            if draft.location.is_none() {
                self.selection.clear_location();
            }
        }

        outcome
    }
}
