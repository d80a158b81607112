mod form;
mod selection;
mod submission;

pub use form::ReportForm;
pub use selection::{CandidateState, GeolocationToken, LocationSelectionController};
pub use submission::{SubmissionController, SUCCESS_MESSAGE};
