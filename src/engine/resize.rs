// src/engine/resize.rs
//
// Raster resizing: progressive halving for large reductions, Lanczos3 final pass.

use crate::engine::common::EngineResult;
use crate::engine::decoder;
use crate::engine::dimensions::CanvasLimits;
use crate::engine::encoder::RasterEncoder;
use crate::error::PixpressError;
use crate::ops::OutputFormat;
use fast_image_resize::{self as fir, MulDiv, PixelType, ResizeOptions};
use image::{imageops::FilterType, DynamicImage, RgbImage, RgbaImage};
use tracing::debug;

/// Number of halving passes before the final resample.
///
/// Zero when neither axis shrinks by more than 2x (including upscales).
pub fn halving_steps(src: (u32, u32), dst: (u32, u32)) -> u32 {
    let ratio_w = src.0 as f64 / dst.0.max(1) as f64;
    let ratio_h = src.1 as f64 / dst.1.max(1) as f64;
    let ratio = ratio_w.max(ratio_h);
    if ratio <= 2.0 {
        return 0;
    }
    ratio.log2().ceil() as u32
}

/// Allocate a zeroed pixel buffer for a `width` x `height` surface.
///
/// Fails with `CanvasAllocation` when the surface exceeds `limits` or the
/// allocator refuses, instead of aborting the process.
pub fn allocate_surface(
    width: u32,
    height: u32,
    pixel_type: PixelType,
    limits: &CanvasLimits,
) -> EngineResult<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(PixpressError::invalid_resize_dimensions(width, height));
    }
    if !limits.permits(width, height) {
        return Err(PixpressError::canvas_allocation(
            width,
            height,
            "surface exceeds the device canvas limits",
        ));
    }
    let bytes = (width as usize)
        .checked_mul(height as usize)
        .and_then(|px| px.checked_mul(pixel_type.size()))
        .ok_or_else(|| {
            PixpressError::canvas_allocation(width, height, "surface size overflows")
        })?;

    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(bytes)
        .map_err(|e| PixpressError::canvas_allocation(width, height, e.to_string()))?;
    buffer.resize(bytes, 0);
    Ok(buffer)
}

/// Resize to exactly `dst_width` x `dst_height`.
pub fn resize_image(
    img: DynamicImage,
    dst_width: u32,
    dst_height: u32,
    limits: &CanvasLimits,
) -> EngineResult<DynamicImage> {
    if (img.width(), img.height()) == (dst_width, dst_height) && dst_width > 0 && dst_height > 0 {
        return Ok(img);
    }
    resize_view(&normalize(img), dst_width, dst_height, limits)
}

/// Resize without taking ownership of the source raster.
///
/// Only the shrinking surfaces are allocated; the source is read in place.
pub fn resize_view(
    img: &DynamicImage,
    dst_width: u32,
    dst_height: u32,
    limits: &CanvasLimits,
) -> EngineResult<DynamicImage> {
    if dst_width == 0 || dst_height == 0 {
        return Err(PixpressError::invalid_resize_dimensions(dst_width, dst_height));
    }
    let src = (img.width(), img.height());
    let steps = halving_steps(src, (dst_width, dst_height));
    debug!(
        src_width = src.0,
        src_height = src.1,
        dst_width,
        dst_height,
        steps,
        "resizing"
    );

    let mut current: Option<DynamicImage> = None;
    loop {
        let view = current.as_ref().unwrap_or(img);
        if view.width() <= dst_width.saturating_mul(2)
            && view.height() <= dst_height.saturating_mul(2)
        {
            break;
        }
        let next_w = (view.width() / 2).max(dst_width);
        let next_h = (view.height() / 2).max(dst_height);
        let next = resize_step(view, next_w, next_h, limits)?;
        current = Some(next);
    }
    let view = current.as_ref().unwrap_or(img);
    if (view.width(), view.height()) == (dst_width, dst_height) {
        return Ok(current.unwrap_or_else(|| img.clone()));
    }
    resize_step(view, dst_width, dst_height, limits)
}

/// Decode `bytes`, resize, and emit a lossless PNG intermediate.
pub fn resize(
    bytes: &[u8],
    dst_width: u32,
    dst_height: u32,
    encoder: &dyn RasterEncoder,
    limits: &CanvasLimits,
) -> EngineResult<Vec<u8>> {
    let decoded = decoder::decode(bytes)?;
    let resized = resize_image(decoded.image, dst_width, dst_height, limits)?;
    encoder.encode(&resized, OutputFormat::Png, 1.0)
}

// fir works on RGB8/RGBA8; everything else goes through RGBA8.
fn normalize(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => img,
        other => DynamicImage::ImageRgba8(other.to_rgba8()),
    }
}

// Canvas limits bind a surface only where it grows past the one being read.
// Shrinking through an oversized source is how the clamp gets under the limit.
fn step_limits(src: (u32, u32), dst: (u32, u32), limits: &CanvasLimits) -> CanvasLimits {
    if dst.0 <= src.0 && dst.1 <= src.1 {
        CanvasLimits::unlimited()
    } else {
        *limits
    }
}

fn resize_step(
    img: &DynamicImage,
    dst_width: u32,
    dst_height: u32,
    limits: &CanvasLimits,
) -> EngineResult<DynamicImage> {
    let src_width = img.width();
    let src_height = img.height();
    let converted: RgbaImage;
    let (pixel_type, src_pixels): (PixelType, &[u8]) = match img {
        DynamicImage::ImageRgb8(rgb) => (PixelType::U8x3, rgb.as_raw()),
        DynamicImage::ImageRgba8(rgba) => (PixelType::U8x4, rgba.as_raw()),
        other => {
            converted = other.to_rgba8();
            (PixelType::U8x4, converted.as_raw())
        }
    };

    let surface_limits = step_limits((src_width, src_height), (dst_width, dst_height), limits);
    let dst_buffer = allocate_surface(dst_width, dst_height, pixel_type, &surface_limits)?;
    let resize_error = |reason: String| {
        PixpressError::resize_failed((src_width, src_height), (dst_width, dst_height), reason)
    };

    let required_bytes = (src_width as usize * src_height as usize) * pixel_type.size();
    if src_pixels.len() < required_bytes {
        return Err(resize_error(format!(
            "source buffer too small: expected {required_bytes} bytes, got {}",
            src_pixels.len()
        )));
    }
    let src_pixels = &src_pixels[..required_bytes];

    let primary = resize_with_fir(
        src_pixels,
        (src_width, src_height),
        pixel_type,
        (dst_width, dst_height),
        dst_buffer,
    );

    match primary {
        Ok(resized) => Ok(resized),
        Err(err) => {
            debug!(error = %err, "fir resize failed, using image crate");
            resize_with_image_crate(
                src_pixels,
                src_width,
                src_height,
                pixel_type,
                dst_width,
                dst_height,
            )
            .map_err(|fallback| {
                resize_error(format!("{err}; image crate fallback failed: {fallback}"))
            })
        }
    }
}

fn is_fully_opaque(rgba: &[u8]) -> bool {
    rgba.iter().skip(3).step_by(4).all(|&alpha| alpha == 255)
}

/// Premultiplied copy of straight-alpha RGBA pixels. `pixels` is left as is.
fn premultiplied_copy(
    pixels: &[u8],
    width: u32,
    height: u32,
) -> Result<fir::images::Image<'static>, String> {
    let src = fir::images::ImageRef::new(width, height, pixels, PixelType::U8x4)
        .map_err(|e| format!("fir source image error: {e:?}"))?;
    let scratch = allocate_surface(width, height, PixelType::U8x4, &CanvasLimits::unlimited())
        .map_err(|e| e.to_string())?;
    let mut premultiplied =
        fir::images::Image::from_vec_u8(width, height, scratch, PixelType::U8x4)
            .map_err(|e| format!("fir scratch image error: {e:?}"))?;
    MulDiv::default()
        .multiply_alpha(&src, &mut premultiplied)
        .map_err(|e| format!("failed to premultiply alpha: {e}"))?;
    Ok(premultiplied)
}

fn resize_with_fir(
    src_pixels: &[u8],
    src: (u32, u32),
    pixel_type: PixelType,
    dst: (u32, u32),
    dst_buffer: Vec<u8>,
) -> Result<DynamicImage, String> {
    let (dst_width, dst_height) = dst;
    let mut dst_image =
        fir::images::Image::from_vec_u8(dst_width, dst_height, dst_buffer, pixel_type)
            .map_err(|e| format!("fir destination image error: {e:?}"))?;

    let options =
        ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3));
    let mut resizer = fir::Resizer::new();
    let needs_premultiply = pixel_type == PixelType::U8x4 && !is_fully_opaque(src_pixels);
    if needs_premultiply {
        let premultiplied = premultiplied_copy(src_pixels, src.0, src.1)?;
        resizer
            .resize(&premultiplied, &mut dst_image, &options)
            .map_err(|e| format!("fir resize error: {e:?}"))?;
        MulDiv::default()
            .divide_alpha_inplace(&mut dst_image)
            .map_err(|e| format!("failed to unpremultiply alpha: {e}"))?;
    } else {
        let src_image = fir::images::ImageRef::new(src.0, src.1, src_pixels, pixel_type)
            .map_err(|e| format!("fir source image error: {e:?}"))?;
        resizer
            .resize(&src_image, &mut dst_image, &options)
            .map_err(|e| format!("fir resize error: {e:?}"))?;
    }

    let pixels = dst_image.into_vec();
    match pixel_type {
        PixelType::U8x3 => RgbImage::from_raw(dst_width, dst_height, pixels)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| "failed to create rgb image from resized data".to_string()),
        PixelType::U8x4 => RgbaImage::from_raw(dst_width, dst_height, pixels)
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(|| "failed to create rgba image from resized data".to_string()),
        _ => Err("unsupported pixel type after resize".to_string()),
    }
}

// Straight-alpha input only; the source copy goes through `allocate_surface`.
fn resize_with_image_crate(
    src_pixels: &[u8],
    src_width: u32,
    src_height: u32,
    pixel_type: PixelType,
    dst_width: u32,
    dst_height: u32,
) -> Result<DynamicImage, String> {
    let mut owned = allocate_surface(src_width, src_height, pixel_type, &CanvasLimits::unlimited())
        .map_err(|e| e.to_string())?;
    if src_pixels.len() < owned.len() {
        return Err(format!(
            "fallback source too small: expected {} bytes, got {}",
            owned.len(),
            src_pixels.len()
        ));
    }
    let len = owned.len();
    owned.copy_from_slice(&src_pixels[..len]);

    let filter = FilterType::Lanczos3;
    match pixel_type {
        PixelType::U8x3 => {
            let rgb = RgbImage::from_raw(src_width, src_height, owned)
                .ok_or_else(|| "failed to build rgb image for fallback resize".to_string())?;
            Ok(DynamicImage::ImageRgb8(image::imageops::resize(
                &rgb, dst_width, dst_height, filter,
            )))
        }
        PixelType::U8x4 => {
            let rgba = RgbaImage::from_raw(src_width, src_height, owned)
                .ok_or_else(|| "failed to build rgba image for fallback resize".to_string())?;
            Ok(DynamicImage::ImageRgba8(image::imageops::resize(
                &rgba, dst_width, dst_height, filter,
            )))
        }
        _ => Err("fallback resize supports only U8x3/U8x4 pixel types".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::encoder::NativeEncoder;
    use crate::error::UserMessage;

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    #[test]
    fn halving_step_counts() {
        assert_eq!(halving_steps((1000, 1000), (600, 600)), 0);
        assert_eq!(halving_steps((1000, 1000), (500, 500)), 0);
        assert_eq!(halving_steps((1000, 1000), (400, 400)), 2);
        assert_eq!(halving_steps((8000, 100), (1000, 100)), 3);
        assert_eq!(halving_steps((100, 100), (400, 400)), 0);
    }

    #[test]
    fn resizes_to_exact_dimensions() {
        let out = resize_image(gradient(1000, 500), 120, 60, &CanvasLimits::mobile()).unwrap();
        assert_eq!((out.width(), out.height()), (120, 60));
    }

    #[test]
    fn upscales_directly() {
        let out = resize_image(gradient(80, 60), 160, 120, &CanvasLimits::mobile()).unwrap();
        assert_eq!((out.width(), out.height()), (160, 120));
    }

    #[test]
    fn keeps_alpha_layout() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            64,
            64,
            image::Rgba([200, 10, 10, 100]),
        ));
        let out = resize_image(img, 16, 16, &CanvasLimits::mobile()).unwrap();
        assert!(matches!(out, DynamicImage::ImageRgba8(_)));
        let px = out.to_rgba8().get_pixel(8, 8).0;
        assert_eq!(px[3], 100);
    }

    #[test]
    fn oversized_surface_is_an_allocation_error() {
        let limits = CanvasLimits::custom(100, 10_000);
        let err = resize_image(gradient(50, 50), 200, 200, &limits).unwrap_err();
        assert!(matches!(err, PixpressError::CanvasAllocation { .. }));
        assert_eq!(UserMessage::from_error(&err), UserMessage::OutOfMemory);
    }

    #[test]
    fn zero_target_is_rejected() {
        let err = resize_image(gradient(10, 10), 0, 5, &CanvasLimits::mobile()).unwrap_err();
        assert!(matches!(err, PixpressError::InvalidResizeDimensions { .. }));
    }

    #[test]
    fn allocate_surface_sizes_buffer() {
        let buf = allocate_surface(10, 4, PixelType::U8x4, &CanvasLimits::mobile()).unwrap();
        assert_eq!(buf.len(), 160);
    }

    #[test]
    fn resize_emits_png_intermediate() {
        let mut png = Vec::new();
        gradient(300, 200)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let out = resize(&png, 30, 20, &NativeEncoder::default(), &CanvasLimits::mobile()).unwrap();
        assert_eq!(OutputFormat::sniff(&out), Some(OutputFormat::Png));
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (30, 20));
    }

    #[test]
    fn shrinking_an_oversized_source_ignores_the_canvas() {
        let limits = CanvasLimits::custom(64, 1_000_000);
        let out = resize_image(gradient(256, 64), 64, 16, &limits).unwrap();
        assert_eq!((out.width(), out.height()), (64, 16));
    }

    #[test]
    fn mobile_clamp_of_a_wide_strip_resizes() {
        let limits = CanvasLimits::mobile();
        let clamp = limits.clamp(9000, 1000);
        assert!(clamp.was_clamped);
        let out =
            resize_image(gradient(9000, 1000), clamp.width, clamp.height, &limits).unwrap();
        assert_eq!((out.width(), out.height()), (clamp.width, clamp.height));
        assert!(limits.permits(out.width(), out.height()));
    }

    #[test]
    fn resize_view_leaves_the_source_alone() {
        let img = gradient(400, 300);
        let out = resize_view(&img, 40, 30, &CanvasLimits::mobile()).unwrap();
        assert_eq!((out.width(), out.height()), (40, 30));
        assert_eq!((img.width(), img.height()), (400, 300));
    }

    #[test]
    fn premultiplied_copy_keeps_straight_source() {
        let pixels: Vec<u8> = [200u8, 10, 10, 100].repeat(4);
        let copy = premultiplied_copy(&pixels, 2, 2).unwrap();
        assert_eq!(&pixels[..4], &[200, 10, 10, 100]);
        let px = &copy.buffer()[..4];
        assert!(px[0] < 90, "premultiplied red {}", px[0]);
        assert_eq!(px[3], 100);
    }

    #[test]
    fn image_crate_fallback_keeps_translucent_colour() {
        let pixels: Vec<u8> = [200u8, 10, 10, 100].repeat(8 * 8);
        let resized = resize_with_image_crate(&pixels, 8, 8, PixelType::U8x4, 4, 4).unwrap();
        let px = resized.to_rgba8().get_pixel(2, 2).0;
        assert!(px[0].abs_diff(200) <= 1, "red {}", px[0]);
        assert!(px[3].abs_diff(100) <= 1, "alpha {}", px[3]);
    }

    #[test]
    fn image_crate_fallback_resizes_rgba() {
        let pixels: Vec<u8> = (0..6 * 3 * 4).map(|i| (i % 251) as u8).collect();
        let resized = resize_with_image_crate(&pixels, 6, 3, PixelType::U8x4, 3, 2).unwrap();
        assert_eq!((resized.width(), resized.height()), (3, 2));
    }
}
