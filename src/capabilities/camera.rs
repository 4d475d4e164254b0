use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::{IDEAL_STREAM_HEIGHT, IDEAL_STREAM_WIDTH, MAX_FRAME_DIMENSION};

/// Camera capability: the shell owns the live stream (a `<video>`
/// element, `AVCaptureSession`, `CameraX`...); the core only sequences
/// start/stop/capture against an opaque stream handle.
#[derive(Clone)]
pub struct Camera<E> {
    context: CapabilityContext<CameraOperation, E>,
}

impl<Ev> Capability<Ev> for Camera<Ev> {
    type Operation = CameraOperation;
    type MappedSelf<MappedEv> = Camera<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Camera::new(self.context.map_event(f))
    }
}

impl<Ev> Camera<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<CameraOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn start_stream<F>(&self, config: StreamConfig, callback: F)
    where
        F: FnOnce(CameraResult) -> Ev + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let result = context
                .request_from_shell(CameraOperation::StartStream { config })
                .await;
            context.update_app(callback(result));
        });
    }

    pub fn stop_stream<F>(&self, stream_id: StreamId, callback: F)
    where
        F: FnOnce(CameraResult) -> Ev + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let result = context
                .request_from_shell(CameraOperation::StopStream { stream_id })
                .await;
            context.update_app(callback(result));
        });
    }

    pub fn capture_frame<F>(&self, stream_id: StreamId, callback: F)
    where
        F: FnOnce(CameraResult) -> Ev + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let result = context
                .request_from_shell(CameraOperation::CaptureFrame { stream_id })
                .await;
            context.update_app(callback(result));
        });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum CameraOperation {
    StartStream { config: StreamConfig },
    StopStream { stream_id: StreamId },
    CaptureFrame { stream_id: StreamId },
}

impl Operation for CameraOperation {
    type Output = CameraResult;
}

/// Opaque shell-side handle for a running stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct StreamId(pub String);

impl StreamId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CameraFacing {
    Front,
    #[default]
    Back,
}

impl CameraFacing {
    /// The `facingMode` constraint value the web shell passes to
    /// `getUserMedia`.
    #[must_use]
    pub const fn constraint_name(self) -> &'static str {
        match self {
            CameraFacing::Front => "user",
            CameraFacing::Back => "environment",
        }
    }

    #[must_use]
    pub const fn toggle(self) -> Self {
        match self {
            CameraFacing::Front => CameraFacing::Back,
            CameraFacing::Back => CameraFacing::Front,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamConfig {
    pub facing: CameraFacing,
    pub ideal_width: u32,
    pub ideal_height: u32,
    /// Delay the shell applies before acquiring the device. Some
    /// hardware refuses a new handle until the previous one is fully
    /// released, so stop-then-start sequences carry a non-zero delay.
    pub settle_delay_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            facing: CameraFacing::default(),
            ideal_width: IDEAL_STREAM_WIDTH,
            ideal_height: IDEAL_STREAM_HEIGHT,
            settle_delay_ms: 0,
        }
    }
}

impl StreamConfig {
    #[must_use]
    pub fn with_facing(mut self, facing: CameraFacing) -> Self {
        self.facing = facing;
        self
    }

    #[must_use]
    pub fn with_settle_delay_ms(mut self, delay_ms: u64) -> Self {
        self.settle_delay_ms = delay_ms;
        self
    }
}

/// One still frame read off the running stream, tightly packed RGBA.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    #[serde(with = "serde_bytes")]
    pub rgba: Vec<u8>,
}

impl RawFrame {
    #[must_use]
    pub fn expected_len(&self) -> Option<usize> {
        let pixels = u64::from(self.width).checked_mul(u64::from(self.height))?;
        usize::try_from(pixels.checked_mul(4)?).ok()
    }

    pub fn validate(&self) -> Result<(), CameraError> {
        if self.width == 0 || self.height == 0 {
            return Err(CameraError::InvalidFrame {
                reason: "zero dimension".to_string(),
            });
        }
        if self.width > MAX_FRAME_DIMENSION || self.height > MAX_FRAME_DIMENSION {
            return Err(CameraError::InvalidFrame {
                reason: format!(
                    "dimensions {}x{} exceed maximum {}",
                    self.width, self.height, MAX_FRAME_DIMENSION
                ),
            });
        }
        match self.expected_len() {
            Some(expected) if expected == self.rgba.len() => Ok(()),
            Some(expected) => Err(CameraError::InvalidFrame {
                reason: format!("{} bytes for {} expected", self.rgba.len(), expected),
            }),
            None => Err(CameraError::InvalidFrame {
                reason: "frame size overflows".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum CameraOutput {
    StreamStarted { stream_id: StreamId },
    StreamStopped,
    Frame(RawFrame),
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum CameraError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("camera {facing:?} not available on this device")]
    NotFound { facing: CameraFacing },

    #[error("camera unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("capture failed: {reason}")]
    CaptureFailed { reason: String },

    #[error("invalid frame: {reason}")]
    InvalidFrame { reason: String },

    #[error("no stream with id {stream_id}")]
    UnknownStream { stream_id: StreamId },

    #[error("another camera operation in progress")]
    Busy,

    #[error("internal camera error: {message}")]
    Internal { message: String },
}

impl CameraError {
    #[must_use]
    pub const fn is_permission_error(&self) -> bool {
        matches!(self, CameraError::PermissionDenied)
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            CameraError::Busy | CameraError::Unavailable { .. } | CameraError::CaptureFailed { .. }
        )
    }
}

pub type CameraResult = Result<CameraOutput, CameraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facing_toggle_round_trips() {
        assert_eq!(CameraFacing::Back.toggle(), CameraFacing::Front);
        assert_eq!(CameraFacing::Front.toggle(), CameraFacing::Back);
        assert_eq!(CameraFacing::Back.toggle().toggle(), CameraFacing::Back);
    }

    #[test]
    fn test_facing_constraint_names() {
        assert_eq!(CameraFacing::Front.constraint_name(), "user");
        assert_eq!(CameraFacing::Back.constraint_name(), "environment");
    }

    #[test]
    fn test_stream_config_defaults() {
        let config = StreamConfig::default();
        assert_eq!(config.facing, CameraFacing::Back);
        assert_eq!(config.ideal_width, 1280);
        assert_eq!(config.ideal_height, 720);
        assert_eq!(config.settle_delay_ms, 0);
    }

    #[test]
    fn test_stream_config_builder() {
        let config = StreamConfig::default()
            .with_facing(CameraFacing::Front)
            .with_settle_delay_ms(300);
        assert_eq!(config.facing, CameraFacing::Front);
        assert_eq!(config.settle_delay_ms, 300);
    }

    #[test]
    fn test_raw_frame_validates_length() {
        let frame = RawFrame {
            width: 2,
            height: 2,
            rgba: vec![0; 16],
        };
        assert!(frame.validate().is_ok());
    }

    #[test]
    fn test_raw_frame_rejects_short_buffer() {
        let frame = RawFrame {
            width: 2,
            height: 2,
            rgba: vec![0; 12],
        };
        assert!(matches!(
            frame.validate(),
            Err(CameraError::InvalidFrame { .. })
        ));
    }

    #[test]
    fn test_raw_frame_rejects_zero_dimension() {
        let frame = RawFrame {
            width: 0,
            height: 720,
            rgba: vec![],
        };
        assert!(frame.validate().is_err());
    }

    #[test]
    fn test_raw_frame_rejects_oversized_dimensions() {
        let frame = RawFrame {
            width: MAX_FRAME_DIMENSION + 1,
            height: 1,
            rgba: vec![0; 4],
        };
        assert!(frame.validate().is_err());
    }

    #[test]
    fn test_camera_error_helpers() {
        assert!(CameraError::PermissionDenied.is_permission_error());
        assert!(!CameraError::Busy.is_permission_error());

        assert!(CameraError::Busy.is_retryable());
        assert!(!CameraError::PermissionDenied.is_retryable());
    }
}
