//! Pick a place and rate how safe it feels.
//!
//! A headless rendition of a report page: a location is chosen by search, map
//! click, device position or launch URL, and a rating with a description is
//! delivered to a review collection endpoint.

#![warn(missing_docs)]

/// Endpoints and tuning knobs.
pub mod config;
/// State owners that turn user and platform events into a location and a submission.
pub mod controller;
/// Access to the device's own position.
pub mod device;
/// Submission failures.
pub mod error;
/// State carried in the report page URL.
pub mod launch;
/// Data exchanged with the user and the remote services.
pub mod protocol;
/// Clients for the geocoder and the review endpoint.
pub mod server;

pub use config::Config;
pub use error::SubmitError;
