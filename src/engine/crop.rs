// src/engine/crop.rs
//
// Crop to a pixel rectangle and hand the region back as a new source.
//
// The cropped region replaces the selected file, so everything downstream
// (classification, sizing, the size guard) sees the crop as the original.

use crate::engine::classifier::has_transparency;
use crate::engine::common::EngineResult;
use crate::engine::decoder;
use crate::engine::dimensions::CanvasLimits;
use crate::engine::encoder::RasterEncoder;
use crate::engine::io::SourceImage;
use crate::engine::resize::allocate_surface;
use crate::error::PixpressError;
use crate::ops::OutputFormat;
use fast_image_resize::PixelType;
use image::{DynamicImage, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Quality the cropped region is re-encoded at.
pub const CROP_QUALITY: f32 = 0.92;

/// Name used when the source has none.
pub const CROPPED_NAME: &str = "cropped.jpg";

/// A rectangle in the oriented source, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Reject empty rectangles and any that leave a `width` x `height` image.
    pub fn validate_within(&self, width: u32, height: u32) -> EngineResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PixpressError::invalid_crop_dimensions(self.width, self.height));
        }
        let right = self.x.checked_add(self.width);
        let bottom = self.y.checked_add(self.height);
        let inside = right.is_some_and(|r| r <= width) && bottom.is_some_and(|b| b <= height);
        if !inside {
            return Err(PixpressError::invalid_crop_bounds(
                (self.x, self.y, self.width, self.height),
                width,
                height,
            ));
        }
        Ok(())
    }
}

/// Copy `rect` out of `img` into a surface allocated under `limits`.
pub fn crop_region(
    img: &DynamicImage,
    rect: CropRect,
    limits: &CanvasLimits,
) -> EngineResult<DynamicImage> {
    rect.validate_within(img.width(), img.height())?;

    let converted: RgbaImage;
    let (pixel_type, raw): (PixelType, &[u8]) = match img {
        DynamicImage::ImageRgb8(rgb) => (PixelType::U8x3, rgb.as_raw()),
        DynamicImage::ImageRgba8(rgba) => (PixelType::U8x4, rgba.as_raw()),
        other => {
            converted = other.to_rgba8();
            (PixelType::U8x4, converted.as_raw())
        }
    };

    let bpp = pixel_type.size();
    let src_stride = img.width() as usize * bpp;
    let row_len = rect.width as usize * bpp;
    let mut out = allocate_surface(rect.width, rect.height, pixel_type, limits)?;
    for (i, row) in out.chunks_exact_mut(row_len).enumerate() {
        let start = (rect.y as usize + i) * src_stride + rect.x as usize * bpp;
        let src_row = raw.get(start..start + row_len).ok_or_else(|| {
            PixpressError::internal_panic("crop row outside the source buffer")
        })?;
        row.copy_from_slice(src_row);
    }

    let region = match pixel_type {
        PixelType::U8x3 => {
            RgbImage::from_raw(rect.width, rect.height, out).map(DynamicImage::ImageRgb8)
        }
        _ => RgbaImage::from_raw(rect.width, rect.height, out).map(DynamicImage::ImageRgba8),
    };
    region.ok_or_else(|| PixpressError::internal_panic("crop surface has the wrong length"))
}

/// Crop `source` to `rect` and re-encode it as a fresh source.
///
/// Opaque regions become JPEG; regions with transparency become PNG so
/// alpha is never flattened. The file name is kept.
pub fn crop(
    source: &SourceImage,
    rect: CropRect,
    encoder: &dyn RasterEncoder,
    limits: &CanvasLimits,
) -> EngineResult<SourceImage> {
    let decoded = decoder::decode(source.data())?;
    let region = crop_region(&decoded.image, rect, limits)?;
    let format = if has_transparency(&region) {
        OutputFormat::Png
    } else {
        OutputFormat::Jpeg
    };
    let data = encoder.encode(&region, format, CROP_QUALITY)?;
    debug!(
        x = rect.x,
        y = rect.y,
        width = rect.width,
        height = rect.height,
        format = format.name(),
        size = data.len(),
        "cropped"
    );
    let name = if source.name.is_empty() {
        CROPPED_NAME.to_string()
    } else {
        source.name.clone()
    };
    Ok(SourceImage::new(name, format.mime(), data))
}
