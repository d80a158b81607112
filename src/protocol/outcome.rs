/// What the message area under the submit button shows.
#[derive(PartialEq, Eq, Debug, Clone, Default)]
pub enum SubmissionOutcome {
    /// Nothing submitted yet.
    #[default]
    Idle,
    /// A request is on the wire.
    InFlight,
    /// The latest attempt finished.
    Completed {
        /// Whether the report was accepted.
        success: bool,
        /// User-facing message for the attempt.
        message: String,
    },
}

impl SubmissionOutcome {
    /// Message to render, if the latest attempt finished.
    pub fn message(&self) -> Option<&str> {
        match self {
            SubmissionOutcome::Completed { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Whether the latest attempt finished successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, SubmissionOutcome::Completed { success: true, .. })
    }
}
