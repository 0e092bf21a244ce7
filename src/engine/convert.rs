// src/engine/convert.rs
//
// Format conversion that never fails.
//
// The encode primitive is not trusted: results are sniffed and rejected if
// empty or mistyped. AVIF falls back to WebP; anything else falls back to
// the input bytes unchanged.

use crate::engine::common::EngineResult;
use crate::engine::decoder;
use crate::engine::dimensions::CanvasLimits;
use crate::engine::encoder::RasterEncoder;
use crate::engine::resize::resize_image;
use crate::error::PixpressError;
use crate::ops::OutputFormat;
use image::{DynamicImage, Rgb, RgbImage};
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConvertFallback {
    None,
    /// A broadly supported sibling format was used instead
    Sibling {
        requested: OutputFormat,
        used: OutputFormat,
    },
    /// Every encode attempt failed; `data` is the input
    Original,
}

#[derive(Clone, Debug)]
pub struct Converted {
    pub data: Vec<u8>,
    /// Sniffed from `data`; `None` only when the untouched input is unrecognised
    pub format: Option<OutputFormat>,
    pub fallback: ConvertFallback,
}

/// Composite alpha over white. JPEG has no alpha, and dropping it would
/// turn transparent regions black.
pub fn flatten_on_white(img: &DynamicImage) -> DynamicImage {
    if !img.color().has_alpha() {
        return img.clone();
    }
    let rgba = img.to_rgba8();
    let out = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let a = a as u32;
        let blend = |c: u8| ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    });
    DynamicImage::ImageRgb8(out)
}

/// Encode `img` as `format` and check the result.
pub fn encode_validated(
    img: &DynamicImage,
    format: OutputFormat,
    quality: f32,
    encoder: &dyn RasterEncoder,
) -> EngineResult<Vec<u8>> {
    if !encoder.supports(format) {
        return Err(PixpressError::unsupported_format(format.name()));
    }
    let prepared;
    let source = if format == OutputFormat::Jpeg && img.color().has_alpha() {
        prepared = flatten_on_white(img);
        &prepared
    } else {
        img
    };
    let data = encoder.encode(source, format, quality)?;
    if data.is_empty() {
        return Err(PixpressError::invalid_encoder_output(format.name(), "empty output"));
    }
    match OutputFormat::sniff(&data) {
        Some(found) if found == format => Ok(data),
        found => Err(PixpressError::invalid_encoder_output(
            format.name(),
            format!("output sniffed as {}", found.map_or("unknown", |f| f.name())),
        )),
    }
}

/// Convert an already decoded image. Never fails.
pub fn convert_image(
    img: &DynamicImage,
    original: &[u8],
    target: OutputFormat,
    quality: f32,
    encoder: &dyn RasterEncoder,
) -> Converted {
    match encode_validated(img, target, quality, encoder) {
        Ok(data) => {
            return Converted {
                data,
                format: Some(target),
                fallback: ConvertFallback::None,
            }
        }
        Err(err) => warn!(format = target.name(), error = %err, "encode rejected"),
    }

    if target == OutputFormat::Avif {
        let sibling = OutputFormat::WebP;
        match encode_validated(img, sibling, quality, encoder) {
            Ok(data) => {
                warn!(
                    requested = target.name(),
                    used = sibling.name(),
                    "fell back to sibling format"
                );
                return Converted {
                    data,
                    format: Some(sibling),
                    fallback: ConvertFallback::Sibling {
                        requested: target,
                        used: sibling,
                    },
                };
            }
            Err(err) => warn!(format = sibling.name(), error = %err, "sibling encode rejected"),
        }
    }

    original_bytes(original)
}

/// Decode `bytes` and re-encode them as `target`. Never fails.
///
/// Dimensions are only reduced when the decoded raster exceeds the canvas
/// ceiling.
pub fn convert(
    bytes: &[u8],
    target: OutputFormat,
    quality: f32,
    encoder: &dyn RasterEncoder,
    limits: &CanvasLimits,
) -> Converted {
    let decoded = match decoder::decode(bytes) {
        Ok(decoded) => decoded,
        Err(err) => {
            warn!(error = %err, "convert: decode failed, returning input");
            return original_bytes(bytes);
        }
    };

    let (w, h) = decoded.dimensions();
    let clamped = limits.clamp(w, h);
    let image = if clamped.was_clamped {
        match resize_image(decoded.image, clamped.width, clamped.height, limits) {
            Ok(img) => img,
            Err(err) => {
                warn!(error = %err, "convert: clamp resize failed, returning input");
                return original_bytes(bytes);
            }
        }
    } else {
        decoded.image
    };

    let converted = convert_image(&image, bytes, target, quality, encoder);
    debug!(
        target = target.name(),
        output = converted.format.map(|f| f.name()),
        size = converted.data.len(),
        "converted"
    );
    converted
}

fn original_bytes(bytes: &[u8]) -> Converted {
    Converted {
        data: bytes.to_vec(),
        format: OutputFormat::sniff(bytes),
        fallback: ConvertFallback::Original,
    }
}
