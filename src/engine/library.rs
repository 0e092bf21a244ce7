// src/engine/library.rs
//
// Size-bounded lossy re-encode with the optimizing codec paths.

use crate::engine::common::EngineResult;
use crate::engine::encoder::{
    encode_avif, encode_jpeg_with_settings, encode_png_optimized, encode_webp, WebPTuning,
};
use crate::engine::quality::to_encoder_quality;
use crate::error::PixpressError;
use crate::ops::OutputFormat;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryOptions {
    /// Output budget; quality is stepped down while the result is larger
    pub max_bytes: usize,
    /// Quality decrement per iteration (0.0-1.0 scale)
    pub step: f32,
    pub max_iterations: u32,
    /// oxipng preset (0-6)
    pub png_level: u8,
}

impl Default for LibraryOptions {
    fn default() -> Self {
        Self {
            max_bytes: 50 * 1024 * 1024,
            step: 0.05,
            max_iterations: 8,
            png_level: 2,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LibraryOutput {
    pub data: Vec<u8>,
    pub quality: f32,
    pub iterations: u32,
}

fn encode_once(
    img: &DynamicImage,
    format: OutputFormat,
    quality: f32,
    opts: &LibraryOptions,
) -> EngineResult<Vec<u8>> {
    let q = to_encoder_quality(quality);
    match format {
        OutputFormat::Jpeg => encode_jpeg_with_settings(img, q, false),
        OutputFormat::Png => encode_png_optimized(img, opts.png_level),
        OutputFormat::WebP => encode_webp(img, q, WebPTuning::Tuned),
        OutputFormat::Avif => encode_avif(img, q),
    }
}

/// Re-encode `img` as `format` starting at `quality`.
///
/// While the output is over `max_bytes`, quality drops by `step` but never
/// below `floor`. PNG is lossless, so it is encoded once.
pub fn compress(
    img: &DynamicImage,
    format: OutputFormat,
    quality: f32,
    floor: f32,
    opts: &LibraryOptions,
) -> EngineResult<LibraryOutput> {
    let floor = floor.clamp(0.0, 1.0);
    let mut current = quality.clamp(floor, 1.0);
    let mut iterations = 1;
    let mut data = encode_once(img, format, current, opts)?;

    while !format.is_lossless()
        && data.len() > opts.max_bytes
        && iterations < opts.max_iterations
        && current > floor
    {
        current = (current - opts.step).max(floor);
        iterations += 1;
        debug!(
            format = format.name(),
            size = data.len(),
            quality = current,
            "over budget, lowering quality"
        );
        data = encode_once(img, format, current, opts)?;
    }

    if data.is_empty() {
        return Err(PixpressError::invalid_encoder_output(format.name(), "empty output"));
    }
    Ok(LibraryOutput {
        data,
        quality: current,
        iterations,
    })
}
