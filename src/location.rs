//! Sampling-location state: manual entry, the cached GPS fix with its
//! freshness window, and reverse-geocode parsing.
//!
//! The text field is the single source of truth handed to submission;
//! the cached fix only short-circuits repeat GPS requests and feeds the
//! accuracy badge.

use serde::{Deserialize, Serialize};

use crate::capabilities::GeoPosition;
use crate::UnixTimeMs;

/// One device fix, kept until it ages out of the freshness window or
/// the user clears the field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: f64,
    pub acquired_at: UnixTimeMs,
}

impl GeoFix {
    #[must_use]
    pub fn from_position(position: GeoPosition, acquired_at: UnixTimeMs) -> Self {
        Self {
            latitude: position.latitude,
            longitude: position.longitude,
            accuracy_m: position.accuracy_m,
            acquired_at,
        }
    }

    #[must_use]
    pub fn is_fresh(&self, now: UnixTimeMs, window_ms: u64) -> bool {
        now.elapsed_since(self.acquired_at) < window_ms
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationState {
    pub text: String,
    pub last_fix: Option<GeoFix>,
    /// Whether the visible accuracy badge is still associated with the
    /// cached fix. Manual edits clear the badge, not the fix.
    pub badge_visible: bool,
    /// Guards against concurrent device requests.
    pub acquiring: bool,
}

impl LocationState {
    /// Manual edit. Returns a notice when the input had to be cut down.
    pub fn set_manual(&mut self, text: &str, max_len: usize) -> Option<String> {
        self.badge_visible = false;
        if text.chars().count() > max_len {
            self.text = text.chars().take(max_len).collect();
            Some(format!(
                "Location input has been truncated to {max_len} characters."
            ))
        } else {
            self.text = text.to_string();
            None
        }
    }

    /// A fix younger than the window is reusable without a new device
    /// round-trip.
    #[must_use]
    pub fn fresh_fix(&self, now: UnixTimeMs, window_ms: u64) -> Option<GeoFix> {
        self.last_fix.filter(|fix| fix.is_fresh(now, window_ms))
    }

    pub fn store_fix(&mut self, fix: GeoFix) {
        self.last_fix = Some(fix);
        self.badge_visible = true;
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.last_fix = None;
        self.badge_visible = false;
    }

    /// `Accuracy: ± 12m`, shown while the badge is associated.
    #[must_use]
    pub fn accuracy_text(&self) -> Option<String> {
        if !self.badge_visible {
            return None;
        }
        self.last_fix
            .map(|fix| format!("Accuracy: ± {}m", fix.accuracy_m.round()))
    }

    /// `(-6.175100, 106.865000)`, shown next to the accuracy.
    #[must_use]
    pub fn coords_text(&self) -> Option<String> {
        if !self.badge_visible {
            return None;
        }
        self.last_fix
            .map(|fix| format!("({:.6}, {:.6})", fix.latitude, fix.longitude))
    }
}

/// The field text used when reverse geocoding fails or returns nothing.
#[must_use]
pub fn coords_fallback(latitude: f64, longitude: f64) -> String {
    format!("GPS: {latitude:.4}, {longitude:.4}")
}

/// Shape of `/api/reverse-geocode` responses (Nominatim, proxied).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReverseGeocodeResponse {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub address: Option<GeocodeAddress>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeocodeAddress {
    #[serde(default)]
    pub village: Option<String>,
    #[serde(default)]
    pub subdistrict: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub town: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// Builds the human-readable place name: joined address parts when the
/// response carries them, otherwise the full `display_name`.
#[must_use]
pub fn place_name(response: &ReverseGeocodeResponse) -> Option<String> {
    if let Some(address) = &response.address {
        let mut parts: Vec<&str> = Vec::with_capacity(4);
        if let Some(village) = address.village.as_deref() {
            parts.push(village);
        }
        if let Some(subdistrict) = address.subdistrict.as_deref() {
            parts.push(subdistrict);
        }
        if let Some(city) = address.city.as_deref().or(address.town.as_deref()) {
            parts.push(city);
        }
        if let Some(state) = address.state.as_deref() {
            parts.push(state);
        }
        if !parts.is_empty() {
            return Some(parts.join(", "));
        }
    }

    response
        .display_name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .map(ToString::to_string)
}
