// src/engine/quality.rs
//
// Slider (1-100) to encoder quality (0.0-1.0) mapping with content floors.

use serde::{Deserialize, Serialize};

/// Perceptual curve from slider position to encoder quality.
///
/// The exponent < 1 keeps the low end of the slider from collapsing into
/// visibly broken output.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityCurve {
    pub min: f32,
    pub max: f32,
    pub exponent: f32,
}

impl Default for QualityCurve {
    fn default() -> Self {
        Self {
            min: 0.70,
            max: 0.95,
            exponent: 0.7,
        }
    }
}

impl QualityCurve {
    pub fn map(&self, slider: u8) -> f32 {
        let normalized = f32::from(slider.clamp(1, 100)) / 100.0;
        self.min + normalized.powf(self.exponent) * (self.max - self.min)
    }
}

/// Minimum encoder quality per content class.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityFloors {
    pub text: f32,
    pub photo: f32,
}

impl Default for QualityFloors {
    fn default() -> Self {
        Self {
            text: 0.80,
            photo: 0.70,
        }
    }
}

impl QualityFloors {
    pub fn floor_for(&self, is_text_like: bool) -> f32 {
        if is_text_like {
            self.text
        } else {
            self.photo
        }
    }

    pub fn enforce(&self, mapped: f32, is_text_like: bool) -> f32 {
        mapped.max(self.floor_for(is_text_like))
    }
}

/// `map_quality` with the default curve.
pub fn map_quality(slider: u8) -> f32 {
    QualityCurve::default().map(slider)
}

/// `enforce_floor` with the default floors.
pub fn enforce_floor(mapped: f32, is_text_like: bool) -> f32 {
    QualityFloors::default().enforce(mapped, is_text_like)
}

/// Quality actually handed to the encoders for one run.
///
/// With compression disabled the pipeline re-encodes at full quality, so
/// the slider is ignored.
pub fn effective_quality(
    curve: &QualityCurve,
    floors: &QualityFloors,
    slider: u8,
    is_text_like: bool,
    enable_compression: bool,
) -> f32 {
    if !enable_compression {
        return 1.0;
    }
    floors.enforce(curve.map(slider), is_text_like)
}

/// Integer quality for codec APIs (mozjpeg, libwebp).
pub fn to_encoder_quality(quality: f32) -> u8 {
    if !quality.is_finite() {
        return 100;
    }
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}
