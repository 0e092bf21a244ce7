// src/engine/dimensions.rs
//
// Target-dimension planning and raster-surface ceilings.
//
// Surface ceilings come as named profiles. `mobile` is the default since
// constrained devices fail to allocate large surfaces; `desktop` relaxes
// it and `unlimited` turns the check off.

use crate::ops::ResizeMode;
use serde::{Deserialize, Serialize};
use tracing::info;

const MOBILE_MAX_DIMENSION: u32 = 4096;
const MOBILE_MAX_PIXELS: u64 = 16_777_216; // 4096^2
const DESKTOP_MAX_DIMENSION: u32 = 16_384;
const DESKTOP_MAX_PIXELS: u64 = 268_435_456; // 16384^2

/// What the user asked for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DimensionRequest {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub maintain_aspect_ratio: bool,
    pub mode: ResizeMode,
}

impl DimensionRequest {
    pub fn is_resize(&self) -> bool {
        self.width.is_some() || self.height.is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlannedDimensions {
    pub width: u32,
    pub height: u32,
}

fn scaled(value: u32, scale: f64) -> u32 {
    ((value as f64 * scale).round() as u32).max(1)
}

/// Plan target dimensions for a source of `source_w` x `source_h`.
///
/// `ShrinkToFit` only ever scales down on the single-axis and locked paths;
/// `Exact` honors the requested axis in both directions. Explicit unlocked
/// width and height are used verbatim in either mode.
pub fn plan(source_w: u32, source_h: u32, req: &DimensionRequest) -> PlannedDimensions {
    let source = PlannedDimensions {
        width: source_w.max(1),
        height: source_h.max(1),
    };
    let exact = req.mode == ResizeMode::Exact;
    let ratio = |target: u32, current: u32| target as f64 / current as f64;

    match (req.width, req.height) {
        (Some(w), Some(h)) if !req.maintain_aspect_ratio => PlannedDimensions {
            width: w.max(1),
            height: h.max(1),
        },
        (Some(w), Some(h)) => {
            let scale = ratio(w, source.width).min(ratio(h, source.height));
            if scale < 1.0 || (exact && scale != 1.0) {
                PlannedDimensions {
                    width: scaled(source.width, scale),
                    height: scaled(source.height, scale),
                }
            } else {
                source
            }
        }
        (Some(w), None) => {
            if source.width > w || (exact && source.width != w) {
                let scale = ratio(w, source.width);
                PlannedDimensions {
                    width: w.max(1),
                    height: if req.maintain_aspect_ratio {
                        scaled(source.height, scale)
                    } else {
                        source.height
                    },
                }
            } else {
                source
            }
        }
        (None, Some(h)) => {
            if source.height > h || (exact && source.height != h) {
                let scale = ratio(h, source.height);
                PlannedDimensions {
                    width: if req.maintain_aspect_ratio {
                        scaled(source.width, scale)
                    } else {
                        source.width
                    },
                    height: h.max(1),
                }
            } else {
                source
            }
        }
        (None, None) => source,
    }
}

/// True when either planned axis exceeds the source.
pub fn is_upscale(source_w: u32, source_h: u32, planned: PlannedDimensions) -> bool {
    planned.width > source_w || planned.height > source_h
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClampedDimensions {
    pub width: u32,
    pub height: u32,
    pub was_clamped: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanvasProfile {
    Mobile,
    Desktop,
    Unlimited,
    Custom,
}

/// Largest raster surface the engine will allocate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasLimits {
    pub profile: CanvasProfile,
    /// Per-axis ceiling; `None` disables the check
    pub max_dimension: Option<u32>,
    /// Total pixel ceiling; `None` disables the check
    pub max_pixels: Option<u64>,
}

impl Default for CanvasLimits {
    fn default() -> Self {
        Self::mobile()
    }
}

impl CanvasLimits {
    pub fn mobile() -> Self {
        Self {
            profile: CanvasProfile::Mobile,
            max_dimension: Some(MOBILE_MAX_DIMENSION),
            max_pixels: Some(MOBILE_MAX_PIXELS),
        }
    }

    pub fn desktop() -> Self {
        Self {
            profile: CanvasProfile::Desktop,
            max_dimension: Some(DESKTOP_MAX_DIMENSION),
            max_pixels: Some(DESKTOP_MAX_PIXELS),
        }
    }

    pub fn unlimited() -> Self {
        Self {
            profile: CanvasProfile::Unlimited,
            max_dimension: None,
            max_pixels: None,
        }
    }

    pub fn custom(max_dimension: u32, max_pixels: u64) -> Self {
        Self {
            profile: CanvasProfile::Custom,
            max_dimension: Some(max_dimension.max(1)),
            max_pixels: Some(max_pixels.max(1)),
        }
    }

    pub fn apply_profile(profile: CanvasProfile) -> Self {
        match profile {
            CanvasProfile::Mobile => Self::mobile(),
            CanvasProfile::Desktop => Self::desktop(),
            CanvasProfile::Unlimited | CanvasProfile::Custom => Self::unlimited(),
        }
    }

    pub fn permits(&self, width: u32, height: u32) -> bool {
        let axis_ok = self
            .max_dimension
            .is_none_or(|max| width <= max && height <= max);
        let pixels_ok = self
            .max_pixels
            .is_none_or(|max| width as u64 * height as u64 <= max);
        axis_ok && pixels_ok
    }

    /// Scale `width` x `height` down proportionally until it fits.
    ///
    /// Never errors; the caller gets `was_clamped` and a log line instead.
    pub fn clamp(&self, width: u32, height: u32) -> ClampedDimensions {
        let width = width.max(1);
        let height = height.max(1);
        if self.permits(width, height) {
            return ClampedDimensions {
                width,
                height,
                was_clamped: false,
            };
        }

        let mut scale = 1.0f64;
        if let Some(max) = self.max_dimension {
            scale = scale.min(max as f64 / width.max(height) as f64);
        }
        if let Some(max) = self.max_pixels {
            let pixels = width as f64 * height as f64;
            scale = scale.min((max as f64 / pixels).sqrt());
        }

        let mut w = ((width as f64 * scale).floor() as u32).max(1);
        let mut h = ((height as f64 * scale).floor() as u32).max(1);
        // floating point can leave the product one row over the pixel cap
        while !self.permits(w, h) && (w > 1 || h > 1) {
            if w >= h {
                w -= 1;
            } else {
                h -= 1;
            }
        }

        info!(
            from_width = width,
            from_height = height,
            to_width = w,
            to_height = h,
            profile = ?self.profile,
            "clamped to device-safe canvas size"
        );
        ClampedDimensions {
            width: w,
            height: h,
            was_clamped: true,
        }
    }
}
