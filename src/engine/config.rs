// src/engine/config.rs
//
// Engine-wide configuration. Every heuristic threshold lives here with its
// documented value as the default; hosts override selectively from JSON.

use crate::engine::classifier::ClassifierThresholds;
use crate::engine::dimensions::CanvasLimits;
use crate::engine::library::LibraryOptions;
use crate::engine::quality::{QualityCurve, QualityFloors};
use crate::error::PixpressError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_OUTPUT_SUFFIX: &str = "compressed";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub canvas: CanvasLimits,
    pub classifier: ClassifierThresholds,
    pub curve: QualityCurve,
    pub floors: QualityFloors,
    pub library: LibraryOptions,
    pub debounce_ms: u64,
    /// Inserted between base name and extension of downloads
    pub output_suffix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            canvas: CanvasLimits::default(),
            classifier: ClassifierThresholds::default(),
            curve: QualityCurve::default(),
            floors: QualityFloors::default(),
            library: LibraryOptions::default(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, PixpressError> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| PixpressError::invalid_config(format!("engine config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn validate(&self) -> Result<(), PixpressError> {
        let c = &self.curve;
        if !(0.0..=1.0).contains(&c.min) || !(0.0..=1.0).contains(&c.max) || c.min > c.max {
            return Err(PixpressError::invalid_config(
                "quality curve bounds must satisfy 0 <= min <= max <= 1",
            ));
        }
        if !(c.exponent.is_finite() && c.exponent > 0.0) {
            return Err(PixpressError::invalid_config("quality curve exponent must be positive"));
        }
        for floor in [self.floors.text, self.floors.photo] {
            if !(0.0..=1.0).contains(&floor) {
                return Err(PixpressError::invalid_config("quality floors must be within 0..=1"));
            }
        }
        if self.classifier.sample_side == 0 {
            return Err(PixpressError::invalid_config("classifier sample side must be at least 1"));
        }
        if self.library.max_iterations == 0 || !(self.library.step > 0.0) {
            return Err(PixpressError::invalid_config(
                "library compression needs at least one iteration and a positive step",
            ));
        }
        if self.output_suffix.is_empty() {
            return Err(PixpressError::invalid_config("output suffix must not be empty"));
        }
        Ok(())
    }
}
