use anyhow::{anyhow, Result};

use crate::protocol::Location;

use super::{Accuracy, GeolocationProvider};

/// A device position supplied up front, e.g. with `--position` on the command line.
///
/// `None` behaves like a device where permission was denied.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedPosition(pub Option<Location>);

impl GeolocationProvider for FixedPosition {
    async fn current_position(&self, _accuracy: Accuracy) -> Result<Location> {
        self.0
            .ok_or_else(|| anyhow!("geolocation unavailable: no position configured"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_position() {
        let here = Location::new(28.61, 77.21);

        assert_eq!(
            FixedPosition(Some(here))
                .current_position(Accuracy::High)
                .await
                .unwrap(),
            here
        );
        assert!(FixedPosition(None)
            .current_position(Accuracy::High)
            .await
            .is_err());
    }
}
