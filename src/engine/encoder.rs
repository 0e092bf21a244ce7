// src/engine/encoder.rs
//
// Encode primitives: JPEG (mozjpeg), PNG (image crate + oxipng), WebP (libwebp),
// AVIF (image crate, behind the `avif` feature).

use crate::engine::common::{run_with_panic_policy, EngineResult};
use crate::engine::quality::to_encoder_quality;
use crate::engine::MAX_DIMENSION;
use crate::error::PixpressError;
use crate::ops::OutputFormat;
use image::{DynamicImage, ImageFormat};
use mozjpeg::{ColorSpace, Compress, ScanMode};
use std::borrow::Cow;
use std::io::Cursor;

/// The platform raster encode primitive.
///
/// Output is not trusted: callers sniff and validate what comes back, so an
/// implementation may return empty or mistyped data without breaking the
/// engine's guarantees.
pub trait RasterEncoder: Send + Sync {
    /// Encode `img` as `format`. `quality` is 0.0-1.0, ignored for PNG.
    fn encode(&self, img: &DynamicImage, format: OutputFormat, quality: f32)
        -> EngineResult<Vec<u8>>;

    fn supports(&self, format: OutputFormat) -> bool;
}

/// Native codec encoder with plain (fast) settings.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeEncoder;

impl RasterEncoder for NativeEncoder {
    fn encode(
        &self,
        img: &DynamicImage,
        format: OutputFormat,
        quality: f32,
    ) -> EngineResult<Vec<u8>> {
        let q = to_encoder_quality(quality);
        match format {
            OutputFormat::Jpeg => encode_jpeg_with_settings(img, q, true),
            OutputFormat::Png => encode_png(img),
            OutputFormat::WebP => encode_webp(img, q, WebPTuning::Plain),
            OutputFormat::Avif => encode_avif(img, q),
        }
    }

    fn supports(&self, format: OutputFormat) -> bool {
        match format {
            OutputFormat::Jpeg | OutputFormat::Png | OutputFormat::WebP => true,
            OutputFormat::Avif => cfg!(feature = "avif"),
        }
    }
}

/// Derives per-codec knobs from an integer quality (0-100).
///
/// Bands:
/// - High (>=85)
/// - Balanced (70-84)
/// - Fast (50-69)
/// - Fastest (<50)
#[derive(Debug, Clone, Copy)]
pub struct QualitySettings {
    quality: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QualityBand {
    High,
    Balanced,
    Fast,
    Fastest,
}

impl QualitySettings {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.min(100) as f32,
        }
    }

    fn band(&self) -> QualityBand {
        if self.quality >= 85.0 {
            QualityBand::High
        } else if self.quality >= 70.0 {
            QualityBand::Balanced
        } else if self.quality >= 50.0 {
            QualityBand::Fast
        } else {
            QualityBand::Fastest
        }
    }

    pub fn jpeg_smoothing(&self) -> u8 {
        if self.quality >= 90.0 {
            0
        } else if self.quality >= 70.0 {
            5
        } else if self.quality >= 60.0 {
            10
        } else {
            18
        }
    }

    pub fn webp_method(&self) -> i32 {
        match self.band() {
            QualityBand::High | QualityBand::Balanced => 6,
            QualityBand::Fast | QualityBand::Fastest => 4,
        }
    }

    pub fn webp_sns_strength(&self) -> i32 {
        match self.band() {
            QualityBand::High => 50,
            QualityBand::Balanced => 70,
            QualityBand::Fast | QualityBand::Fastest => 80,
        }
    }

    pub fn webp_filter_strength(&self) -> i32 {
        if self.quality >= 80.0 {
            20
        } else if self.quality >= 60.0 {
            30
        } else {
            40
        }
    }

    pub fn webp_filter_sharpness(&self) -> i32 {
        match self.band() {
            QualityBand::High => 2,
            QualityBand::Balanced | QualityBand::Fast | QualityBand::Fastest => 0,
        }
    }

    /// rav1e speed: 1 (slowest) to 10 (fastest)
    pub fn avif_speed(&self) -> u8 {
        match self.band() {
            QualityBand::High => 6,
            QualityBand::Balanced => 7,
            QualityBand::Fast => 8,
            QualityBand::Fastest => 9,
        }
    }
}

fn ensure_encodable(img: &DynamicImage, format: &'static str) -> EngineResult<(u32, u32)> {
    let (w, h) = (img.width(), img.height());
    if w == 0 || h == 0 {
        return Err(PixpressError::encode_failed(
            format,
            "image width or height is zero",
        ));
    }
    if w > MAX_DIMENSION || h > MAX_DIMENSION {
        return Err(PixpressError::dimension_exceeds_limit(w.max(h), MAX_DIMENSION));
    }
    Ok((w, h))
}

/// Encode to JPEG with mozjpeg.
///
/// `fast_mode` disables optimized Huffman coding and scan optimization;
/// the library compression step runs with it off.
pub fn encode_jpeg_with_settings(
    img: &DynamicImage,
    quality: u8,
    fast_mode: bool,
) -> EngineResult<Vec<u8>> {
    run_with_panic_policy("encode:jpeg", || {
        let (w, h) = ensure_encodable(img, "jpeg")?;
        let rgb: Cow<'_, image::RgbImage> = match img {
            DynamicImage::ImageRgb8(rgb_img) => Cow::Borrowed(rgb_img),
            _ => Cow::Owned(img.to_rgb8()),
        };
        let pixels: &[u8] = rgb.as_raw();
        if pixels.len() != (w as usize) * (h as usize) * 3 {
            return Err(PixpressError::corrupted_image());
        }

        let settings = QualitySettings::new(quality);
        let mut comp = Compress::new(ColorSpace::JCS_RGB);
        comp.set_size(w as usize, h as usize);
        comp.set_color_space(ColorSpace::JCS_YCbCr);
        comp.set_quality(quality.clamp(1, 100) as f32);
        comp.set_chroma_sampling_pixel_sizes((2, 2), (2, 2));
        comp.set_progressive_mode();

        if fast_mode {
            comp.set_optimize_coding(false);
            comp.set_optimize_scans(false);
        } else {
            comp.set_optimize_coding(true);
            comp.set_optimize_scans(true);
            comp.set_scan_optimization_mode(ScanMode::AllComponentsTogether);
            comp.set_smoothing_factor(settings.jpeg_smoothing());
        }

        let mut output = Vec::with_capacity((w as usize * h as usize * 3 / 10).max(4096));
        {
            let mut writer = comp.start_compress(&mut output).map_err(|e| {
                PixpressError::encode_failed(
                    "jpeg",
                    format!("mozjpeg: failed to start compress: {e:?}"),
                )
            })?;
            for row in pixels.chunks(w as usize * 3) {
                writer.write_scanlines(row).map_err(|e| {
                    PixpressError::encode_failed(
                        "jpeg",
                        format!("mozjpeg: failed to write scanlines: {e:?}"),
                    )
                })?;
            }
            writer.finish().map_err(|e| {
                PixpressError::encode_failed("jpeg", format!("mozjpeg: failed to finish: {e:?}"))
            })?;
        }
        Ok(output)
    })
}

/// Encode to PNG with the image crate (no optimization pass).
pub fn encode_png(img: &DynamicImage) -> EngineResult<Vec<u8>> {
    run_with_panic_policy("encode:png", || {
        ensure_encodable(img, "png")?;
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| PixpressError::encode_failed("png", format!("PNG encode failed: {e}")))?;
        Ok(buf)
    })
}

/// Encode to PNG and run oxipng at `level` (0-6). Lossless.
pub fn encode_png_optimized(img: &DynamicImage, level: u8) -> EngineResult<Vec<u8>> {
    let raw = encode_png(img)?;
    run_with_panic_policy("encode:png:oxipng", || {
        let mut options = oxipng::Options::from_preset(level.min(6));
        // metadata is handled separately, never by the optimizer
        options.strip = oxipng::StripChunks::Safe;
        oxipng::optimize_from_memory(&raw, &options).map_err(|e| {
            PixpressError::encode_failed("png", format!("oxipng optimization failed: {e}"))
        })
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebPTuning {
    /// libwebp defaults at the given quality
    Plain,
    /// Quality-band method/filter settings
    Tuned,
}

/// Encode to WebP with libwebp. Keeps the alpha channel only when the
/// image actually has one.
pub fn encode_webp(img: &DynamicImage, quality: u8, tuning: WebPTuning) -> EngineResult<Vec<u8>> {
    run_with_panic_policy("encode:webp", || {
        let (w, h) = ensure_encodable(img, "webp")?;

        let rgba_holder;
        let rgb_holder;
        let encoder = if img.color().has_alpha() {
            rgba_holder = match img {
                DynamicImage::ImageRgba8(buf) => Cow::Borrowed(buf),
                _ => Cow::Owned(img.to_rgba8()),
            };
            webp::Encoder::from_rgba(rgba_holder.as_raw(), w, h)
        } else {
            rgb_holder = match img {
                DynamicImage::ImageRgb8(buf) => Cow::Borrowed(buf),
                _ => Cow::Owned(img.to_rgb8()),
            };
            webp::Encoder::from_rgb(rgb_holder.as_raw(), w, h)
        };

        let mut config = webp::WebPConfig::new()
            .map_err(|_| PixpressError::internal_panic("failed to create WebPConfig"))?;
        let settings = QualitySettings::new(quality);
        config.quality = settings.quality;
        if tuning == WebPTuning::Tuned {
            config.method = settings.webp_method();
            config.sns_strength = settings.webp_sns_strength();
            config.autofilter = 1;
            config.filter_strength = settings.webp_filter_strength();
            config.filter_sharpness = settings.webp_filter_sharpness();
        }

        let mem = encoder.encode_advanced(&config).map_err(|e| {
            PixpressError::encode_failed("webp", format!("WebP encode failed: {e:?}"))
        })?;
        Ok(mem.to_vec())
    })
}

/// Encode to AVIF (rav1e through the image crate).
#[cfg(feature = "avif")]
pub fn encode_avif(img: &DynamicImage, quality: u8) -> EngineResult<Vec<u8>> {
    use image::codecs::avif::AvifEncoder;
    use image::{ExtendedColorType, ImageEncoder};

    run_with_panic_policy("encode:avif", || {
        let (w, h) = ensure_encodable(img, "avif")?;
        let settings = QualitySettings::new(quality);
        let rgba: Cow<'_, image::RgbaImage> = match img {
            DynamicImage::ImageRgba8(buf) => Cow::Borrowed(buf),
            _ => Cow::Owned(img.to_rgba8()),
        };
        let mut out = Vec::new();
        AvifEncoder::new_with_speed_quality(&mut out, settings.avif_speed(), quality.clamp(1, 100))
            .write_image(rgba.as_raw(), w, h, ExtendedColorType::Rgba8)
            .map_err(|e| PixpressError::encode_failed("avif", format!("AVIF encode failed: {e}")))?;
        Ok(out)
    })
}

#[cfg(not(feature = "avif"))]
pub fn encode_avif(_img: &DynamicImage, _quality: u8) -> EngineResult<Vec<u8>> {
    Err(PixpressError::unsupported_format(
        "AVIF encoding requires the `avif` feature",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{RgbImage, RgbaImage};

    fn create_test_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    fn translucent(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, (x % 200) as u8])
        }))
    }

    #[test]
    fn jpeg_has_soi_and_eoi() {
        let result = encode_jpeg_with_settings(&create_test_image(100, 100), 80, false).unwrap();
        assert_eq!(&result[0..2], &[0xFF, 0xD8]);
        assert_eq!(&result[result.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn jpeg_fast_mode_stays_reasonable() {
        let img = create_test_image(300, 300);
        let fast = encode_jpeg_with_settings(&img, 80, true).unwrap();
        let optimized = encode_jpeg_with_settings(&img, 80, false).unwrap();
        assert!(fast.len() < optimized.len() * 2);
    }

    #[test]
    fn jpeg_drops_alpha() {
        let result = encode_jpeg_with_settings(&translucent(32, 32), 80, true).unwrap();
        assert_eq!(OutputFormat::sniff(&result), Some(OutputFormat::Jpeg));
    }

    #[test]
    fn png_optimized_is_not_larger() {
        let img = create_test_image(120, 80);
        let plain = encode_png(&img).unwrap();
        let optimized = encode_png_optimized(&img, 2).unwrap();
        assert_eq!(OutputFormat::sniff(&optimized), Some(OutputFormat::Png));
        assert!(optimized.len() <= plain.len());
    }

    #[test]
    fn webp_keeps_alpha() {
        let result = encode_webp(&translucent(40, 40), 80, WebPTuning::Plain).unwrap();
        assert_eq!(&result[0..4], b"RIFF");
        assert_eq!(&result[8..12], b"WEBP");
        let decoded = image::load_from_memory(&result).unwrap();
        assert!(decoded.color().has_alpha());
    }

    #[test]
    fn webp_tuned_output_is_valid() {
        let result = encode_webp(&create_test_image(64, 64), 60, WebPTuning::Tuned).unwrap();
        assert_eq!(OutputFormat::sniff(&result), Some(OutputFormat::WebP));
    }

    #[test]
    fn native_encoder_dispatch() {
        let img = create_test_image(16, 16);
        let enc = NativeEncoder;
        for format in [OutputFormat::Jpeg, OutputFormat::Png, OutputFormat::WebP] {
            assert!(enc.supports(format));
            let out = enc.encode(&img, format, 0.8).unwrap();
            assert_eq!(OutputFormat::sniff(&out), Some(format));
        }
    }

    #[cfg(not(feature = "avif"))]
    #[test]
    fn avif_unsupported_without_feature() {
        let enc = NativeEncoder;
        assert!(!enc.supports(OutputFormat::Avif));
        assert!(enc
            .encode(&create_test_image(8, 8), OutputFormat::Avif, 0.8)
            .is_err());
    }

    #[cfg(feature = "avif")]
    #[test]
    fn avif_encodes_with_feature() {
        let out = encode_avif(&create_test_image(32, 32), 60).unwrap();
        assert_eq!(OutputFormat::sniff(&out), Some(OutputFormat::Avif));
    }

    #[test]
    fn zero_sized_image_is_rejected() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert!(encode_png(&img).is_err());
    }

    #[test]
    fn quality_band_mapping_is_stable() {
        assert_eq!(QualitySettings::new(90).avif_speed(), 6);
        assert_eq!(QualitySettings::new(75).avif_speed(), 7);
        assert_eq!(QualitySettings::new(60).avif_speed(), 8);
        assert_eq!(QualitySettings::new(40).avif_speed(), 9);

        let high = QualitySettings::new(90);
        assert_eq!(high.webp_sns_strength(), 50);
        assert_eq!(high.webp_filter_strength(), 20);
        assert_eq!(high.webp_filter_sharpness(), 2);
        assert_eq!(QualitySettings::new(40).webp_filter_strength(), 40);
        assert_eq!(QualitySettings::new(95).jpeg_smoothing(), 0);
        assert_eq!(QualitySettings::new(50).jpeg_smoothing(), 18);
    }
}
