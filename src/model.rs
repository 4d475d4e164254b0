use serde::{Deserialize, Serialize};
use std::fmt;

use crate::capabilities::{CameraFacing, StreamId};
use crate::config::WorkflowConfig;
use crate::location::LocationState;
use crate::staging::StagedImage;
use crate::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionMode {
    #[default]
    File,
    Camera,
}

impl AcquisitionMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Camera => "camera",
        }
    }
}

/// Camera session state machine.
///
/// ```text
/// Stopped -> Starting -> Active -> Capturing -> Captured
///    ^          |          |           |           |
///    +----------+----------+-----------+           |
///               ^------------- retake -------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CameraPhase {
    #[default]
    Stopped,
    Starting,
    Active,
    Capturing,
    Captured,
}

impl CameraPhase {
    /// A start must not be issued while another acquisition or a
    /// capture read-out is in flight.
    #[must_use]
    pub const fn blocks_start(self) -> bool {
        matches!(self, Self::Starting | Self::Capturing)
    }

    #[must_use]
    pub const fn can_capture(self) -> bool {
        matches!(self, Self::Active)
    }

    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        match self {
            Self::Stopped => matches!(to, Self::Starting),
            Self::Starting => matches!(to, Self::Active | Self::Stopped),
            Self::Active => matches!(to, Self::Capturing | Self::Stopped),
            Self::Capturing => matches!(to, Self::Captured | Self::Active | Self::Stopped),
            Self::Captured => matches!(to, Self::Starting | Self::Stopped),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraSession {
    pub phase: CameraPhase,
    pub facing: CameraFacing,
    pub stream: Option<StreamId>,
    /// A start that must wait for the pending stop to complete. This is
    /// how stop-before-start ordering is enforced on facing switches.
    pub start_pending: bool,
}

impl CameraSession {
    pub fn reset(&mut self) {
        self.phase = CameraPhase::Stopped;
        self.stream = None;
        self.start_pending = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Brin,
    #[default]
    Guest,
}

/// Authentication flags injected from the page context at boot. Purely
/// a UX gate — the backend enforces the real rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AuthContext {
    pub is_authenticated: bool,
    pub role: UserRole,
}

impl AuthContext {
    #[must_use]
    pub const fn member(role: UserRole) -> Self {
        Self {
            is_authenticated: true,
            role,
        }
    }

    /// Camera capture and submission are blocked for visitors and
    /// guest sessions.
    #[must_use]
    pub const fn may_upload(&self) -> bool {
        self.is_authenticated && matches!(self.role, UserRole::Brin)
    }
}

/// Dropdown entries of the classification-model select, in display
/// order. The first entry is the default.
pub const MODEL_OPTIONS: &[&str] = &[
    "efficientnetv2b0",
    "efficientnetv1",
    "mobilenetv2",
    "mobilenetv3",
    "resnet50",
    "resnetv2",
];

/// The currently chosen classification model. Browser selects are
/// stringly-typed and can hand over `""`, `"null"` or `"undefined"`;
/// all of those resolve to the configured default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSelection(Option<String>);

impl ModelSelection {
    pub fn set(&mut self, raw: &str) {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "null" || trimmed == "undefined" {
            self.0 = None;
        } else {
            self.0 = Some(trimmed.to_string());
        }
    }

    #[must_use]
    pub fn resolve<'a>(&'a self, default: &'a str) -> &'a str {
        self.0.as_deref().unwrap_or(default)
    }

    #[must_use]
    pub const fn is_set(&self) -> bool {
        self.0.is_some()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Model {
    pub config: WorkflowConfig,
    pub auth: AuthContext,

    pub mode: AcquisitionMode,
    pub staged: Option<StagedImage>,
    pub camera: CameraSession,
    pub location: LocationState,
    pub model_selection: ModelSelection,

    pub eager_upload_in_flight: bool,
    pub is_submitting: bool,
    pub redirect: Option<String>,

    pub active_error: Option<AppError>,
    pub active_notice: Option<String>,
    pub show_welcome: bool,
}

impl Model {
    /// Cancel/reset of the staged upload also resets the location
    /// field, unless a GPS fix still backs it.
    pub fn reset_location_unless_gps(&mut self) {
        if self.location.last_fix.is_none() {
            self.location.text.clear();
            self.location.badge_visible = false;
        }
    }
}

// Redact the staged photo and location text: both are user data, and
// the photo can be megabytes.
impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("mode", &self.mode)
            .field("staged_present", &self.staged.is_some())
            .field("camera", &self.camera)
            .field("location_set", &!self.location.text.is_empty())
            .field("model_selection", &self.model_selection)
            .field("eager_upload_in_flight", &self.eager_upload_in_flight)
            .field("is_submitting", &self.is_submitting)
            .field("redirect", &self.redirect)
            .field("show_welcome", &self.show_welcome)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::GeoFix;
    use crate::UnixTimeMs;

    #[test]
    fn default_mode_is_file() {
        assert_eq!(Model::default().mode, AcquisitionMode::File);
        assert_eq!(Model::default().camera.phase, CameraPhase::Stopped);
    }

    #[test]
    fn phase_transition_table() {
        use CameraPhase::{Active, Captured, Capturing, Starting, Stopped};

        assert!(Stopped.can_transition_to(Starting));
        assert!(!Stopped.can_transition_to(Active));
        assert!(Starting.can_transition_to(Active));
        assert!(Starting.can_transition_to(Stopped));
        assert!(Active.can_transition_to(Capturing));
        assert!(Capturing.can_transition_to(Captured));
        assert!(Captured.can_transition_to(Starting));
        assert!(!Captured.can_transition_to(Capturing));
    }

    #[test]
    fn starting_and_capturing_block_new_starts() {
        assert!(CameraPhase::Starting.blocks_start());
        assert!(CameraPhase::Capturing.blocks_start());
        assert!(!CameraPhase::Stopped.blocks_start());
        assert!(!CameraPhase::Captured.blocks_start());
    }

    #[test]
    fn only_brin_members_may_upload() {
        assert!(AuthContext::member(UserRole::Brin).may_upload());
        assert!(!AuthContext::member(UserRole::Guest).may_upload());
        assert!(!AuthContext::default().may_upload());
    }

    #[test]
    fn model_selection_sentinels_resolve_to_default() {
        let mut selection = ModelSelection::default();
        assert_eq!(selection.resolve("efficientnetv2b0"), "efficientnetv2b0");

        for sentinel in ["", "  ", "null", "undefined"] {
            selection.set(sentinel);
            assert!(!selection.is_set(), "{sentinel:?} should unset");
            assert_eq!(selection.resolve("efficientnetv2b0"), "efficientnetv2b0");
        }

        selection.set("resnet50");
        assert_eq!(selection.resolve("efficientnetv2b0"), "resnet50");
    }

    #[test]
    fn location_reset_respects_gps_backing() {
        let mut model = Model::default();
        model.location.text = "typed by hand".into();
        model.reset_location_unless_gps();
        assert!(model.location.text.is_empty());

        model.location.text = "Pluit, Jakarta Utara".into();
        model.location.store_fix(GeoFix {
            latitude: -6.1,
            longitude: 106.8,
            accuracy_m: 9.0,
            acquired_at: UnixTimeMs(0),
        });
        model.reset_location_unless_gps();
        assert_eq!(model.location.text, "Pluit, Jakarta Utara");
    }

    #[test]
    fn model_debug_redacts_user_data() {
        let mut model = Model::default();
        model.location.text = "somewhere private".into();
        let rendered = format!("{model:?}");
        assert!(!rendered.contains("somewhere private"));
        assert!(rendered.contains("location_set"));
    }
}
