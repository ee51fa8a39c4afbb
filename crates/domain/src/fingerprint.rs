//! Client-submitted fingerprint payloads.

use pixelwall_core::{AppError, AppResult};
use serde::Deserialize;

/// Parsed browser fingerprint submitted by the probe script.
///
/// The payload is untrusted client telemetry; anything that fails to parse
/// is treated as a bot signal by the caller, not as an error to surface.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Fingerprint {
    /// Whether the browser reported an automation driver.
    #[serde(default)]
    pub webdriver: bool,
    /// User-agent string as seen from inside the page, when reported.
    #[serde(default)]
    pub ua: Option<String>,
    /// Declared user-agent client-hint brand list.
    #[serde(default)]
    pub brands: Vec<String>,
}

impl Fingerprint {
    /// Parses a raw fingerprint payload.
    pub fn parse(raw: &str) -> AppResult<Self> {
        serde_json::from_str(raw)
            .map_err(|error| AppError::Validation(format!("malformed fingerprint: {error}")))
    }

    /// Returns whether the embedded user-agent carries a headless marker.
    #[must_use]
    pub fn reports_headless_ua(&self) -> bool {
        self.ua
            .as_deref()
            .is_some_and(|ua| ua.to_lowercase().contains("headless"))
    }

    /// Returns whether the brand list shows the headless-Chrome tell: a
    /// Chromium brand alongside a synthetic "Not A Brand" placeholder.
    #[must_use]
    pub fn has_synthetic_brand_pair(&self) -> bool {
        let chromium = self
            .brands
            .iter()
            .any(|brand| brand.to_lowercase().contains("chromium"));
        let placeholder = self.brands.iter().any(|brand| {
            let lowered = brand.to_lowercase();
            lowered.contains("not") && lowered.contains("brand")
        });

        chromium && placeholder
    }
}
