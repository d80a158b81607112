use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::{
    config::Config,
    protocol::{ReportDraft, SubmissionOutcome},
    server::{ReportSink, ReviewResponse},
};

/// Shown after the endpoint accepted a review.
pub const SUCCESS_MESSAGE: &str = "Report submitted successfully!";

/// Validates drafts and delivers them, one attempt per call.
pub struct SubmissionController<S> {
    sink: S,
    outcome: watch::Sender<SubmissionOutcome>,
    clear_location_on_success: bool,
    last_success_at: Option<DateTime<Utc>>,
}

impl<S: ReportSink> SubmissionController<S> {
    /// Nothing submitted yet; reviews go to `sink`.
    pub fn new(sink: S, config: &Config) -> Self {
        let (outcome, _) = watch::channel(SubmissionOutcome::Idle);

        Self {
            sink,
            outcome,
            clear_location_on_success: config.clear_location_on_success,
            last_success_at: None,
        }
    }

    /// The latest outcome.
    pub fn outcome(&self) -> SubmissionOutcome {
        self.outcome.borrow().clone()
    }

    /// Follow outcome changes, e.g. to render a spinner while in flight.
    pub fn subscribe(&self) -> watch::Receiver<SubmissionOutcome> {
        self.outcome.subscribe()
    }

    /// Whether a submission is on the wire.
    pub fn is_submitting(&self) -> bool {
        *self.outcome.borrow() == SubmissionOutcome::InFlight
    }

    /// When the last accepted review went out.
    pub fn last_success_at(&self) -> Option<DateTime<Utc>> {
        self.last_success_at
    }

    /// Validate `draft` and, if complete, send it once.
    ///
    /// Incomplete drafts never touch the network. On success the draft's
    /// description and rating are cleared, and its location too unless the
    /// configuration says otherwise. Nothing is retried.
    pub async fn submit(&mut self, draft: &mut ReportDraft) -> SubmissionOutcome {
        let payload = match draft.to_payload() {
            Ok(payload) => payload,
            Err(e) => return self.finish(false, e.user_message()),
        };

        self.outcome.send_replace(SubmissionOutcome::InFlight);

        let result = self
            .sink
            .send(&payload)
            .await
            .and_then(ReviewResponse::into_receipt);

        match result {
            Ok(receipt) => {
                let now = Utc::now();
                log::info!(
                    "review from {} accepted at {} (status {}): {}",
                    payload.user_id,
                    now.to_rfc3339(),
                    receipt.status,
                    receipt.data
                );

                draft.reset(self.clear_location_on_success);
                self.last_success_at = Some(now);
                self.finish(true, SUCCESS_MESSAGE.to_string())
            }
            Err(e) => {
                log::error!("submission failed: {e}");
                self.finish(false, e.user_message())
            }
        }
    }

    fn finish(&mut self, success: bool, message: String) -> SubmissionOutcome {
        let outcome = SubmissionOutcome::Completed { success, message };
        self.outcome.send_replace(outcome.clone());
        outcome
    }
}
