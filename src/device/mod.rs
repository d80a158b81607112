use core::future::Future;

use anyhow::Result;

use crate::protocol::Location;

/// A position source that always answers with the same fix.
mod fixed;

pub use fixed::FixedPosition;

/// How precise a position request should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Accuracy {
    /// Whatever the platform answers fastest with.
    Coarse,
    /// Ask for the best fix the hardware can give.
    #[default]
    High,
}

/// The device's own idea of where it is.
pub trait GeolocationProvider: Send + Sync {
    /// Single-shot position request. Permission denials and timeouts are errors.
    fn current_position(&self, accuracy: Accuracy) -> impl Future<Output = Result<Location>> + Send;
}
