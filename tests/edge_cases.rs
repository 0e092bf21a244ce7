// tests/edge_cases.rs
//
// Scenario and boundary tests for pixpress.
// Covers the documented end-to-end scenarios plus degenerate inputs.

use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use pixpress::engine::convert::convert;
use pixpress::engine::quality::map_quality;
use pixpress::engine::{
    classify_image, CanvasLimits, ClassifierThresholds, CompressionWorker, Compressor,
    ConvertFallback, Diagnostic, EngineConfig, EngineResult, NativeEncoder, RasterEncoder,
    SourceImage,
};
use pixpress::{CompressionSettings, OutputFormat, PixpressError, ResizeMode, UserMessage};
use std::io::Cursor;
use std::sync::Arc;

fn compressor_with(encoder: Arc<dyn RasterEncoder>) -> Compressor {
    Compressor::new(EngineConfig::default(), encoder, CompressionWorker::inline())
}

fn compressor() -> Compressor {
    compressor_with(Arc::new(NativeEncoder))
}

fn encode(img: &DynamicImage, format: image::ImageFormat) -> Vec<u8> {
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), format).unwrap();
    out
}

// White page with margins and lines of thin dark strokes.
fn scanned_page(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        let in_line = (y % 60) < 20;
        let in_glyph = (x % 9) < 2;
        let in_margin = x < width / 8
            || x > width - width / 8
            || y < height / 12
            || y > height - height / 12;
        if in_line && in_glyph && !in_margin {
            Rgb([12, 12, 12])
        } else {
            Rgb([250, 250, 250])
        }
    }))
}

fn photo(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        let noise = ((x * 31 + y * 17) % 23) as u8;
        Rgb([
            (40 + (x * 150 / width) as u8).saturating_add(noise),
            (30 + (y * 120 / height) as u8).saturating_add(noise),
            90u8.saturating_add(noise),
        ])
    }))
}

/// Native encoder on a platform without AVIF.
struct NoAvif;

impl RasterEncoder for NoAvif {
    fn encode(
        &self,
        img: &DynamicImage,
        format: OutputFormat,
        quality: f32,
    ) -> EngineResult<Vec<u8>> {
        if format == OutputFormat::Avif {
            return Err(PixpressError::unsupported_format("avif"));
        }
        NativeEncoder.encode(img, format, quality)
    }

    fn supports(&self, format: OutputFormat) -> bool {
        format != OutputFormat::Avif
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_text_document_at_quality_20() {
    let page = scanned_page(2000, 2600);
    let result = classify_image(&page, &ClassifierThresholds::default());
    assert!(result.is_text_like);
    assert!(!result.has_transparency);

    let mapped = map_quality(20);
    assert!((mapped - 0.781).abs() < 0.005, "mapped {mapped}");

    let source = SourceImage::from_bytes("scan.png", encode(&page, image::ImageFormat::Png));
    let settings = CompressionSettings::default()
        .with_format(OutputFormat::Png)
        .with_quality(20);
    let outcome = compressor().compress(&source, &settings).unwrap();
    assert!(outcome.classification.is_text_like);
    assert!(outcome.quality >= 0.80);
    assert!((outcome.quality - 0.80).abs() < 1e-6);
    assert_eq!(outcome.format, OutputFormat::Png);
    assert_eq!((outcome.width, outcome.height), (2000, 2600));
    assert!(outcome.size() <= source.len());
}

#[test]
fn test_photo_upscale_disables_compression() {
    let jpeg = encode(&photo(800, 600), image::ImageFormat::Jpeg);
    let source = SourceImage::from_bytes("photo.jpg", jpeg);
    let settings = CompressionSettings {
        width: Some(1600),
        maintain_aspect_ratio: true,
        resize_mode: ResizeMode::Exact,
        ..CompressionSettings::default()
    };
    let outcome = compressor().compress(&source, &settings).unwrap();
    assert!(outcome.compression_auto_disabled);
    assert_eq!((outcome.width, outcome.height), (1600, 1200));
    assert_eq!(outcome.quality, 1.0);
    assert_eq!(outcome.format, OutputFormat::Jpeg);
}

#[test]
fn test_avif_without_encoder_support_falls_back_to_webp() {
    let png = encode(&photo(64, 48), image::ImageFormat::Png);
    let source = SourceImage::from_bytes("holiday.png", png);
    let settings = CompressionSettings::default().with_format(OutputFormat::Avif);
    let outcome = compressor_with(Arc::new(NoAvif)).compress(&source, &settings).unwrap();
    assert_eq!(outcome.selected_format, OutputFormat::Avif);
    assert_eq!(outcome.format, OutputFormat::WebP);
    assert_eq!(outcome.file_name("holiday.png", "compressed"), "holiday-compressed.webp");
    assert!(outcome.diagnostics.contains(&Diagnostic::FormatFallback(ConvertFallback::Sibling {
        requested: OutputFormat::Avif,
        used: OutputFormat::WebP,
    })));
}

#[cfg(not(feature = "avif"))]
#[test]
fn test_native_encoder_without_avif_feature_falls_back() {
    let source = SourceImage::from_bytes("a.png", encode(&photo(32, 32), image::ImageFormat::Png));
    let settings = CompressionSettings::default().with_format(OutputFormat::Avif);
    let outcome = compressor().compress(&source, &settings).unwrap();
    assert_eq!(outcome.file_name("a.png", "compressed"), "a-compressed.webp");
}

#[test]
fn test_conversion_is_idempotent() {
    let limits = CanvasLimits::mobile();
    let png = encode(&photo(96, 64), image::ImageFormat::Png);
    for format in [OutputFormat::Jpeg, OutputFormat::Png, OutputFormat::WebP] {
        let first = convert(&png, format, 0.8, &NativeEncoder, &limits);
        assert_eq!(first.format, Some(format));
        let second = convert(&first.data, format, 0.8, &NativeEncoder, &limits);
        assert_eq!(second.format, Some(format));
        assert_eq!(second.fallback, ConvertFallback::None);
        let ratio = second.data.len() as f64 / first.data.len() as f64;
        assert!(
            (0.75..=1.25).contains(&ratio),
            "{format}: {} vs {}",
            first.data.len(),
            second.data.len()
        );
    }
}

// =============================================================================
// Boundaries
// =============================================================================

#[test]
fn test_empty_input_is_an_error() {
    let source = SourceImage::new("empty.png", "image/png", Vec::new());
    let err = compressor().compress(&source, &CompressionSettings::default()).unwrap_err();
    assert!(matches!(err, PixpressError::DecodeFailed { .. }));
}

#[test]
fn test_header_over_decode_limit_is_oversized() {
    let wide = DynamicImage::ImageRgb8(RgbImage::new(40_000, 1));
    let source = SourceImage::from_bytes("strip.png", encode(&wide, image::ImageFormat::Png));
    let err = compressor().compress(&source, &CompressionSettings::default()).unwrap_err();
    assert_eq!(UserMessage::from_error(&err), UserMessage::OversizedImage);
}

#[test]
fn test_single_pixel_image() {
    let source = SourceImage::from_bytes("dot.png", encode(&photo(1, 1), image::ImageFormat::Png));
    let outcome = compressor()
        .compress(&source, &CompressionSettings::default().with_format(OutputFormat::WebP))
        .unwrap();
    assert_eq!((outcome.width, outcome.height), (1, 1));
    assert_eq!(outcome.format, OutputFormat::WebP);
}

#[test]
fn test_unlocked_box_is_used_verbatim() {
    let png = encode(&photo(100, 100), image::ImageFormat::Png);
    let source = SourceImage::from_bytes("p.png", png);
    let settings = CompressionSettings {
        width: Some(50),
        height: Some(20),
        maintain_aspect_ratio: false,
        format: OutputFormat::Png,
        ..CompressionSettings::default()
    };
    let outcome = compressor().compress(&source, &settings).unwrap();
    assert_eq!((outcome.width, outcome.height), (50, 20));
}

#[test]
fn test_locked_box_fits_inside() {
    let png = encode(&photo(200, 100), image::ImageFormat::Png);
    let source = SourceImage::from_bytes("p.png", png);
    let settings = CompressionSettings::default()
        .with_format(OutputFormat::Png)
        .with_width(80)
        .with_height(80);
    let outcome = compressor().compress(&source, &settings).unwrap();
    assert_eq!((outcome.width, outcome.height), (80, 40));
}

#[test]
fn test_target_above_canvas_is_clamped() {
    let config = EngineConfig {
        canvas: CanvasLimits::custom(128, 10_000),
        ..EngineConfig::default()
    };
    let compressor = Compressor::new(config, Arc::new(NativeEncoder), CompressionWorker::inline());
    let png = encode(&photo(100, 100), image::ImageFormat::Png);
    let source = SourceImage::from_bytes("p.png", png);
    let settings = CompressionSettings {
        width: Some(400),
        resize_mode: ResizeMode::Exact,
        format: OutputFormat::Png,
        ..CompressionSettings::default()
    };
    let outcome = compressor.compress(&source, &settings).unwrap();
    assert!(outcome.clamped);
    assert!(outcome.width as u64 * outcome.height as u64 <= 10_000);
    assert_eq!(outcome.width, outcome.height);
}

#[test]
fn test_source_far_over_mobile_canvas_is_clamped() {
    let png = encode(&photo(9000, 1000), image::ImageFormat::Png);
    let source = SourceImage::from_bytes("banner.png", png);
    let outcome = compressor()
        .compress(&source, &CompressionSettings::default().with_format(OutputFormat::WebP))
        .unwrap();
    assert!(outcome.clamped);
    assert_eq!((outcome.width, outcome.height), (4096, 455));
    assert_eq!(outcome.format, OutputFormat::WebP);
    assert!(outcome.diagnostics.contains(&Diagnostic::SourceClamped {
        from: (9000, 1000),
        to: (4096, 455),
    }));
}

#[test]
fn test_conversion_clamps_instead_of_returning_the_source() {
    let png = encode(&photo(9000, 1000), image::ImageFormat::Png);
    let limits = CanvasLimits::mobile();
    let converted = convert(&png, OutputFormat::WebP, 0.8, &NativeEncoder, &limits);
    assert_eq!(converted.fallback, ConvertFallback::None);
    assert_eq!(converted.format, Some(OutputFormat::WebP));
    let decoded = image::load_from_memory(&converted.data).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (4096, 455));
}

#[test]
fn test_transparent_png_requested_as_jpeg_keeps_alpha() {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_fn(40, 40, |x, y| {
        Rgba([200, 30, 30, if x + y < 20 { 0 } else { 255 }])
    }));
    let source = SourceImage::from_bytes("logo.png", encode(&img, image::ImageFormat::Png));
    let outcome = compressor().compress(&source, &CompressionSettings::default()).unwrap();
    assert_eq!(outcome.format, OutputFormat::WebP);
    let decoded = image::load_from_memory(&outcome.data).unwrap().to_rgba8();
    assert!(decoded.get_pixel(0, 0)[3] < 128);
}

#[test]
fn test_keeping_metadata_preserves_exif() {
    let jpeg = encode(&photo(32, 32), image::ImageFormat::Jpeg);
    let tiff = b"MM\x00\x2a\x00\x00\x00\x08\x00\x00\x00\x00\x00\x00";
    let tagged = pixpress::engine::metadata::embed_exif(&jpeg, tiff).unwrap();
    let source = SourceImage::from_bytes("cam.jpg", tagged);
    let settings = CompressionSettings {
        strip_metadata: false,
        format: OutputFormat::WebP,
        ..CompressionSettings::default()
    };
    let outcome = compressor().compress(&source, &settings).unwrap();
    assert_eq!(outcome.format, OutputFormat::WebP);
    assert_eq!(
        pixpress::engine::metadata::extract_exif(&outcome.data).as_deref(),
        Some(&tiff[..])
    );
}
