use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{GPS_MAXIMUM_AGE_MS, GPS_TIMEOUT_MS};

/// Geolocation capability: a single position fix per request. Watch
/// subscriptions stay shell-side; the core only ever needs one fix and
/// caches it itself.
#[derive(Clone)]
pub struct Geolocation<E> {
    context: CapabilityContext<GeolocationOperation, E>,
}

impl<Ev> Capability<Ev> for Geolocation<Ev> {
    type Operation = GeolocationOperation;
    type MappedSelf<MappedEv> = Geolocation<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Geolocation::new(self.context.map_event(f))
    }
}

impl<Ev> Geolocation<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<GeolocationOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn get_position<F>(&self, options: PositionOptions, callback: F)
    where
        F: FnOnce(GeoResult) -> Ev + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let result = context
                .request_from_shell(GeolocationOperation::GetPosition { options })
                .await;
            context.update_app(callback(result));
        });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum GeolocationOperation {
    GetPosition { options: PositionOptions },
}

impl Operation for GeolocationOperation {
    type Output = GeoResult;
}

/// Mirrors the browser `PositionOptions`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout_ms: u64,
    pub maximum_age_ms: u64,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout_ms: GPS_TIMEOUT_MS,
            maximum_age_ms: GPS_MAXIMUM_AGE_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: f64,
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum GeoError {
    #[error("location access denied by user")]
    PermissionDenied,

    #[error("location information unavailable")]
    PositionUnavailable,

    #[error("location request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("geolocation is not supported on this device")]
    Unsupported,
}

impl GeoError {
    /// The error line shown under the GPS button.
    #[must_use]
    pub fn status_message(&self) -> String {
        let cause = match self {
            GeoError::PermissionDenied => "Location access denied by user.",
            GeoError::PositionUnavailable => "Location information unavailable.",
            GeoError::Timeout { .. } => "Location request timed out.",
            GeoError::Unsupported => {
                return "Your device doesn't support GPS location. Please enter location manually."
                    .to_string()
            }
        };
        format!("Failed to get location. {cause}")
    }

    /// The follow-up action the alert suggests.
    #[must_use]
    pub const fn user_action(&self) -> &'static str {
        match self {
            GeoError::PermissionDenied => "Please enable location permissions and try again.",
            GeoError::PositionUnavailable => "Please check if GPS is enabled on your device.",
            GeoError::Timeout { .. } | GeoError::Unsupported => {
                "Please try again or enter location manually."
            }
        }
    }

    #[must_use]
    pub const fn offers_retry(&self) -> bool {
        !matches!(self, GeoError::Unsupported)
    }
}

pub type GeoResult = Result<GeoPosition, GeoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_options_default_to_high_accuracy() {
        let options = PositionOptions::default();
        assert!(options.high_accuracy);
        assert_eq!(options.timeout_ms, 15_000);
        assert_eq!(options.maximum_age_ms, 60_000);
    }

    #[test]
    fn test_error_messages_are_specific_per_kind() {
        assert!(GeoError::PermissionDenied
            .status_message()
            .contains("denied by user"));
        assert!(GeoError::PositionUnavailable
            .status_message()
            .contains("unavailable"));
        assert!(GeoError::Timeout { timeout_ms: 15_000 }
            .status_message()
            .contains("timed out"));
        assert!(GeoError::Unsupported
            .status_message()
            .contains("enter location manually"));
    }

    #[test]
    fn test_unsupported_offers_no_retry() {
        assert!(GeoError::PermissionDenied.offers_retry());
        assert!(GeoError::Timeout { timeout_ms: 1 }.offers_retry());
        assert!(!GeoError::Unsupported.offers_retry());
    }
}
