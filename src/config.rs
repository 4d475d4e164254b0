//! Workflow configuration. Shells deserialize this from whatever they
//! have (JSON blob in the page context, a bundled file) and pass it in
//! with the boot event; every knob has a production default.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::{
    CAMERA_SETTLE_DELAY_MS, CAPTURE_JPEG_QUALITY, DEFAULT_MODEL_OPTION, GEOCODE_TIMEOUT_MS,
    GPS_MAXIMUM_AGE_MS, GPS_TIMEOUT_MS, IDEAL_STREAM_HEIGHT, IDEAL_STREAM_WIDTH,
    LOCATION_CACHE_WINDOW_MS, MAX_IMAGE_BYTES, MAX_LOCATION_LENGTH, PREDICT_TIMEOUT_MS,
    UPLOAD_TIMEOUT_MS,
};

pub const DEFAULT_API_BASE: &str = "https://planktoscan.app";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid api_base '{base}': {reason}")]
    InvalidApiBase { base: String, reason: String },

    #[error("default_model cannot be empty")]
    EmptyDefaultModel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Origin of the prediction backend, no trailing slash required.
    pub api_base: String,
    pub upload_timeout_ms: u64,
    pub predict_timeout_ms: u64,
    pub geocode_timeout_ms: u64,
    pub gps_timeout_ms: u64,
    pub gps_maximum_age_ms: u64,
    pub max_image_bytes: usize,
    pub max_location_length: usize,
    pub location_cache_window_ms: u64,
    pub capture_jpeg_quality: u8,
    pub camera_settle_delay_ms: u64,
    pub ideal_stream_width: u32,
    pub ideal_stream_height: u32,
    pub default_model: String,
    /// Commit picked files to `POST /upload` at selection time and
    /// submit the returned path, the way the legacy flow did. Off by
    /// default: the whole payload goes to `/predict` in one request.
    pub eager_upload: bool,
    /// Reject submission on an empty location instead of substituting
    /// the `Unknown` sentinel.
    pub require_location: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            upload_timeout_ms: UPLOAD_TIMEOUT_MS,
            predict_timeout_ms: PREDICT_TIMEOUT_MS,
            geocode_timeout_ms: GEOCODE_TIMEOUT_MS,
            gps_timeout_ms: GPS_TIMEOUT_MS,
            gps_maximum_age_ms: GPS_MAXIMUM_AGE_MS,
            max_image_bytes: MAX_IMAGE_BYTES,
            max_location_length: MAX_LOCATION_LENGTH,
            location_cache_window_ms: LOCATION_CACHE_WINDOW_MS,
            capture_jpeg_quality: CAPTURE_JPEG_QUALITY,
            camera_settle_delay_ms: CAMERA_SETTLE_DELAY_MS,
            ideal_stream_width: IDEAL_STREAM_WIDTH,
            ideal_stream_height: IDEAL_STREAM_HEIGHT,
            default_model: DEFAULT_MODEL_OPTION.to_string(),
            eager_upload: false,
            require_location: false,
        }
    }
}

impl WorkflowConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.api_base).map_err(|e| ConfigError::InvalidApiBase {
            base: self.api_base.clone(),
            reason: e.to_string(),
        })?;
        if self.default_model.trim().is_empty() {
            return Err(ConfigError::EmptyDefaultModel);
        }
        Ok(())
    }

    /// Joins a path onto the API base: `endpoint("predict")`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// The reverse-geocode endpoint with coordinates attached.
    #[must_use]
    pub fn reverse_geocode_endpoint(&self, latitude: f64, longitude: f64) -> String {
        format!(
            "{}?lat={latitude}&lon={longitude}",
            self.endpoint("api/reverse-geocode")
        )
    }
}
