use serde::{Deserialize, Serialize};
use std::fmt;

use crate::capabilities::{CameraResult, GeoResult, HttpResult, KvResult};
use crate::config::WorkflowConfig;
use crate::model::{AcquisitionMode, AuthContext};

// --- Coordinate: validated, NaN-safe ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("invalid coordinate: lat={0}, lon={1}")]
    InvalidCoordinate(f64, f64),
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self, ValidationError> {
        if !lat.is_finite()
            || !lon.is_finite()
            || !(-90.0..=90.0).contains(&lat)
            || !(-180.0..=180.0).contains(&lon)
        {
            return Err(ValidationError::InvalidCoordinate(lat, lon));
        }
        Ok(Self { lat, lon })
    }

    #[must_use]
    pub const fn lat(&self) -> f64 {
        self.lat
    }

    #[must_use]
    pub const fn lon(&self) -> f64 {
        self.lon
    }
}

impl PartialEq for Coordinate {
    fn eq(&self, other: &Self) -> bool {
        self.lat.to_bits() == other.lat.to_bits() && self.lon.to_bits() == other.lon.to_bits()
    }
}

impl Eq for Coordinate {}

// --- Boot context handed over by the shell ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boot {
    pub auth: AuthContext,
    #[serde(default)]
    pub config: WorkflowConfig,
}

// --- Picked/dropped file as the shell hands it over ---

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePayload {
    pub name: String,
    pub mime: String,
    #[serde(with = "serde_bytes")]
    pub bytes: Vec<u8>,
}

// Redact file bytes in debug output.
impl fmt::Debug for FilePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilePayload")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

// --- Event enum: user intents plus capability results, large variants boxed ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // Boot & welcome popup
    Started(Box<Boot>),
    WelcomeFlagLoaded(Box<KvResult>),
    WelcomeDismissed,
    WelcomeFlagStored(Box<KvResult>),

    // Mode switch
    ModeSelected(AcquisitionMode),

    // File acquisition
    FileSelected(Box<FilePayload>),
    StagedImageCleared,
    EagerUploadResponse(Box<HttpResult>),

    // Camera acquisition
    CameraStreamStarted(Box<CameraResult>),
    CameraStreamStopped(Box<CameraResult>),
    SwitchFacingRequested,
    CapturePhotoRequested,
    CameraFrameCaptured(Box<CameraResult>),
    RetakeRequested,

    // Location resolver
    LocationInputChanged(String),
    GpsLocationRequested,
    GpsPositionReceived(Box<GeoResult>),
    ReverseGeocodeResolved(Box<HttpResult>),
    LocationCleared,

    // Model selection & submission
    ModelSelected(String),
    SubmitRequested,
    PredictResponse(Box<HttpResult>),

    // Alerts
    ErrorDismissed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_rejects_nan_and_infinity() {
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::NAN).is_err());
        assert!(Coordinate::new(f64::INFINITY, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::NEG_INFINITY).is_err());
    }

    #[test]
    fn coordinate_rejects_out_of_range() {
        assert!(Coordinate::new(91.0, 0.0).is_err());
        assert!(Coordinate::new(-91.0, 0.0).is_err());
        assert!(Coordinate::new(0.0, 181.0).is_err());
        assert!(Coordinate::new(0.0, -181.0).is_err());
    }

    #[test]
    fn coordinate_accepts_bounds() {
        assert!(Coordinate::new(90.0, 180.0).is_ok());
        assert!(Coordinate::new(-90.0, -180.0).is_ok());
        assert!(Coordinate::new(-6.1751, 106.865).is_ok());
    }

    #[test]
    fn file_payload_debug_hides_bytes() {
        let payload = FilePayload {
            name: "reef.jpg".into(),
            mime: "image/jpeg".into(),
            bytes: vec![0xFF; 1024],
        };
        let rendered = format!("{payload:?}");
        assert!(rendered.contains("reef.jpg"));
        assert!(rendered.contains("1024"));
        assert!(!rendered.contains("255, 255"));
    }

    #[test]
    fn event_size_is_reasonable() {
        // Boxing keeps the enum small; capability payloads can be large.
        let size = std::mem::size_of::<Event>();
        assert!(
            size <= 64,
            "Event enum is {size} bytes — too large, box more variants"
        );
    }
}
