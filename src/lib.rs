#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

//! Headless capture/upload/predict workflow core for PlanktoScan.
//!
//! The crate holds all client-side state of the plankton-classification
//! front end — acquisition mode, staged image, camera session, sampling
//! location, model selection, submission — and drives the platform shell
//! through serializable capability operations. The shell owns the view
//! and renders from [`app::ViewModel`].

pub mod app;
pub mod capabilities;
pub mod config;
pub mod event;
pub mod imaging;
pub mod location;
pub mod model;
pub mod staging;

use serde::{Deserialize, Serialize};

pub use app::{App, ViewModel};
pub use capabilities::{Capabilities, Effect};
pub use config::WorkflowConfig;
pub use event::{Boot, Event};
pub use model::Model;

pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_LOCATION_LENGTH: usize = 255;
pub const LOCATION_CACHE_WINDOW_MS: u64 = 5 * 60 * 1000;
pub const GPS_TIMEOUT_MS: u64 = 15_000;
pub const GPS_MAXIMUM_AGE_MS: u64 = 60_000;
pub const GEOCODE_TIMEOUT_MS: u64 = 15_000;
pub const UPLOAD_TIMEOUT_MS: u64 = 30_000;
pub const PREDICT_TIMEOUT_MS: u64 = 60_000;
pub const IDEAL_STREAM_WIDTH: u32 = 1280;
pub const IDEAL_STREAM_HEIGHT: u32 = 720;
pub const MAX_FRAME_DIMENSION: u32 = 4096;
pub const CAPTURE_JPEG_QUALITY: u8 = 90;
pub const CAMERA_SETTLE_DELAY_MS: u64 = 300;
pub const CAMERA_CAPTURE_FILENAME: &str = "camera-capture.jpg";
pub const DEFAULT_MODEL_OPTION: &str = "efficientnetv2b0";
pub const UNKNOWN_LOCATION: &str = "Unknown";
pub const LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Timeout,
    Authentication,
    Authorization,
    Validation,
    PayloadTooLarge,
    UnsupportedMediaType,
    Unprocessable,
    Server,
    Protocol,
    Camera,
    CameraPermissionDenied,
    Location,
    LocationPermissionDenied,
    LocationUnavailable,
    LocationTimeout,
    FeatureUnavailable,
    ImageInvalid,
    ImageTooLarge,
    Storage,
    Internal,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Authentication => "AUTH_ERROR",
            Self::Authorization => "FORBIDDEN",
            Self::Validation => "VALIDATION_ERROR",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::UnsupportedMediaType => "UNSUPPORTED_MEDIA_TYPE",
            Self::Unprocessable => "UNPROCESSABLE",
            Self::Server => "SERVER_ERROR",
            Self::Protocol => "PROTOCOL_ERROR",
            Self::Camera => "CAMERA_ERROR",
            Self::CameraPermissionDenied => "CAMERA_PERMISSION_DENIED",
            Self::Location => "LOCATION_ERROR",
            Self::LocationPermissionDenied => "LOCATION_PERMISSION_DENIED",
            Self::LocationUnavailable => "LOCATION_UNAVAILABLE",
            Self::LocationTimeout => "LOCATION_TIMEOUT",
            Self::FeatureUnavailable => "FEATURE_UNAVAILABLE",
            Self::ImageInvalid => "IMAGE_INVALID",
            Self::ImageTooLarge => "IMAGE_TOO_LARGE",
            Self::Storage => "STORAGE_ERROR",
            Self::Internal => "INTERNAL_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Network
            | Self::Timeout
            | Self::Server
            | Self::Camera
            | Self::Location
            | Self::LocationUnavailable
            | Self::LocationTimeout
            | Self::Storage => ErrorSeverity::Transient,

            Self::Protocol | Self::Internal => ErrorSeverity::Fatal,

            Self::Authentication
            | Self::Authorization
            | Self::Validation
            | Self::PayloadTooLarge
            | Self::UnsupportedMediaType
            | Self::Unprocessable
            | Self::CameraPermissionDenied
            | Self::LocationPermissionDenied
            | Self::FeatureUnavailable
            | Self::ImageInvalid
            | Self::ImageTooLarge
            | Self::Unknown => ErrorSeverity::Permanent,
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network
                | Self::Timeout
                | Self::Server
                | Self::Camera
                | Self::Location
                | Self::LocationUnavailable
                | Self::LocationTimeout
                | Self::Storage
        )
    }
}

/// A surfaced, user-facing error. `message` is the short headline the
/// alert layer shows as a title, `detail` the longer guidance text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub detail: Option<String>,
    pub offer_retry: bool,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            detail: None,
            offer_retry: false,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    #[must_use]
    pub fn with_retry(mut self) -> Self {
        self.offer_retry = true;
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable() && !matches!(self.severity, ErrorSeverity::Fatal)
    }

    /// Maps a `/predict`-style HTTP status to the message the front end
    /// has always shown for it.
    #[must_use]
    pub fn from_http_status(status: u16, body: &[u8]) -> Self {
        match status {
            401 => Self::new(ErrorKind::Authentication, "Session Expired")
                .with_detail("Your session has expired. Please sign in again."),
            403 => Self::new(ErrorKind::Authorization, "Not Allowed")
                .with_detail("You don't have permission to perform this action."),
            413 => Self::new(ErrorKind::PayloadTooLarge, "File Too Large")
                .with_detail("File too large. Please upload a smaller image."),
            415 => Self::new(ErrorKind::UnsupportedMediaType, "Unsupported File")
                .with_detail("Unsupported file type. Please upload a valid image."),
            422 => {
                let detail = server_error_text(body)
                    .unwrap_or_else(|| "The server rejected the request.".to_string());
                Self::new(ErrorKind::Unprocessable, "Invalid Request").with_detail(detail)
            }
            500..=599 => Self::new(ErrorKind::Server, "Server Error")
                .with_detail("Server error. Please try again later."),
            _ => Self::new(ErrorKind::Unknown, "Request Failed")
                .with_detail(format!("Server error: HTTP {status}")),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

fn server_error_text(body: &[u8]) -> Option<String> {
    let parsed: ApiErrorBody = serde_json::from_slice(body).ok()?;
    parsed.error.or(parsed.detail)
}

/// Explicit timestamp unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnixTimeMs(pub u64);

impl UnixTimeMs {
    #[must_use]
    pub fn now() -> Self {
        let ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        Self(ms)
    }

    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn elapsed_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    #[must_use]
    pub fn add_millis(self, ms: u64) -> Self {
        Self(self.0.saturating_add(ms))
    }
}

/// Human-readable size label for the file-info line, e.g. `2.5 MB`.
#[must_use]
pub fn format_file_size(bytes: usize) -> String {
    const UNITS: &[&str] = &["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    #[allow(clippy::cast_precision_loss)]
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    let rounded = (size * 100.0).round() / 100.0;
    if (rounded - rounded.trunc()).abs() < f64::EPSILON {
        format!("{} {}", rounded.trunc(), UNITS[unit])
    } else {
        format!("{rounded} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_codes_are_stable() {
        assert_eq!(ErrorKind::Network.code(), "NETWORK_ERROR");
        assert_eq!(ErrorKind::PayloadTooLarge.code(), "PAYLOAD_TOO_LARGE");
        assert_eq!(
            ErrorKind::CameraPermissionDenied.code(),
            "CAMERA_PERMISSION_DENIED"
        );
    }

    #[test]
    fn transient_kinds_are_retryable() {
        assert!(ErrorKind::Network.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(ErrorKind::Server.is_retryable());
        assert!(!ErrorKind::Validation.is_retryable());
        assert!(!ErrorKind::CameraPermissionDenied.is_retryable());
    }

    #[test]
    fn http_status_413_maps_to_file_too_large() {
        let err = AppError::from_http_status(413, b"");
        assert_eq!(err.kind, ErrorKind::PayloadTooLarge);
        assert!(err.detail.unwrap().contains("smaller image"));
    }

    #[test]
    fn http_status_415_maps_to_unsupported_type() {
        let err = AppError::from_http_status(415, b"");
        assert_eq!(err.kind, ErrorKind::UnsupportedMediaType);
    }

    #[test]
    fn http_status_422_pulls_server_message() {
        let err = AppError::from_http_status(422, br#"{"error": "location too long"}"#);
        assert_eq!(err.detail.as_deref(), Some("location too long"));
    }

    #[test]
    fn http_status_5xx_maps_to_server_error() {
        for status in [500, 502, 503] {
            let err = AppError::from_http_status(status, b"");
            assert_eq!(err.kind, ErrorKind::Server);
            assert!(err.is_retryable());
        }
    }

    #[test]
    fn fatal_errors_are_never_retryable() {
        let err = AppError::new(ErrorKind::Protocol, "bad payload");
        assert!(!err.is_retryable());
    }

    #[test]
    fn elapsed_since_saturates() {
        let earlier = UnixTimeMs(1_000);
        let later = UnixTimeMs(4_000);
        assert_eq!(later.elapsed_since(earlier), 3_000);
        assert_eq!(earlier.elapsed_since(later), 0);
    }

    #[test]
    fn file_sizes_format_like_the_upload_zone() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(2 * 1024 * 1024), "2 MB");
        assert_eq!(format_file_size(2_621_440), "2.5 MB");
    }
}
