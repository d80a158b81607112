use thiserror::Error;

/// Prefix put in front of every transport or server failure shown to the user.
pub const FAILURE_PREFIX: &str = "Failed to submit report.";

/// Why a submission attempt did not go through.
#[derive(Error, Debug)]
pub enum SubmitError {
    /// The draft is missing a description, a location or a rating.
    #[error("Please fill all fields and select location and rating.")]
    Incomplete,

    /// The endpoint answered with a non-success status.
    #[error("{message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message taken from the body, or derived from the status code.
        message: String,
    },

    /// The request never completed.
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// The response body could not be read.
    #[error("malformed response body: {0}")]
    MalformedBody(String),
}

impl SubmitError {
    /// Status error whose message is derived from the code alone.
    pub fn from_status(status: u16) -> Self {
        SubmitError::Status {
            status,
            message: format!("HTTP error! status: {status}"),
        }
    }

    /// The line shown in the form's message area.
    pub fn user_message(&self) -> String {
        match self {
            SubmitError::Incomplete => self.to_string(),
            _ => format!("{FAILURE_PREFIX} {self}"),
        }
    }
}
