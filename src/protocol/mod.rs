mod candidate;
mod location;
mod outcome;
mod report;

pub use candidate::SearchCandidate;
pub use location::Location;
pub use outcome::SubmissionOutcome;
pub use report::{Rating, ReportDraft, ReviewPayload};
