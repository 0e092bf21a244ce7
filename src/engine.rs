// src/engine.rs
//
// The core of pixpress. A decision engine that, for one image:
// 1. Classifies content (text-like or photographic, transparent or not)
// 2. Maps the quality slider onto a floored encoder quality
// 3. Picks a safe container and plans target dimensions
// 4. Runs the candidate chain and never returns something bigger than it must
//
// This file is a facade over the modules in engine/.

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed image dimension (width or height) accepted by the decoder.
/// Images larger than 32768x32768 are rejected to prevent decompression bombs.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height) accepted by the decoder.
/// 100 megapixels = 400MB uncompressed RGBA.
pub const MAX_PIXELS: u64 = 100_000_000;

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

pub mod classifier;
mod common;
pub mod config;
pub mod convert;
pub mod crop;
pub mod decoder;
pub mod dimensions;
pub mod encoder;
pub mod io;
pub mod library;
pub mod metadata;
pub mod orchestrator;
pub mod pool;
pub mod quality;
pub mod queue;
pub mod resize;
pub mod selector;
pub mod session;
pub mod urls;

pub use classifier::{
    classify_bytes, classify_image, ClassificationResult, ClassifierThresholds, ContentStats,
};
pub use common::{run_with_panic_policy, EngineResult};
pub use config::EngineConfig;
pub use convert::{convert, ConvertFallback, Converted};
pub use crop::{crop, crop_region, CropRect};
pub use decoder::{check_dimensions, decode, Decoded};
pub use dimensions::{plan, CanvasLimits, CanvasProfile, DimensionRequest, PlannedDimensions};
pub use encoder::{NativeEncoder, RasterEncoder};
pub use io::{output_file_name, AcceptPolicy, SourceImage};
pub use library::LibraryOptions;
pub use orchestrator::{Compressor, Diagnostic, EncodingOutcome};
pub use pool::CompressionWorker;
pub use quality::{effective_quality, enforce_floor, map_quality, QualityCurve, QualityFloors};
pub use queue::{
    AddReport, ArchiveSink, BatchSummary, FileQueue, FileQueueItem, FileStatus, ARCHIVE_NAME,
};
pub use resize::resize_image;
pub use selector::select_format;
pub use session::{Debouncer, RunTicket, Session, SessionPhase};
pub use urls::{ObjectUrl, ObjectUrlRegistry};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PixpressError;
    use crate::ops::{CompressionSettings, OutputFormat};
    use image::{DynamicImage, RgbImage};
    use std::sync::Arc;

    fn create_png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }));
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    mod limits {
        use super::*;

        #[test]
        fn test_check_dimensions_limits() {
            assert!(check_dimensions(MAX_DIMENSION, 1).is_ok());
            assert!(matches!(
                check_dimensions(MAX_DIMENSION + 1, 1),
                Err(PixpressError::DimensionExceedsLimit { .. })
            ));
            assert!(matches!(
                check_dimensions(20_000, 20_000),
                Err(PixpressError::PixelCountExceedsLimit { .. })
            ));
        }

        #[test]
        fn test_canvas_limits_are_below_decode_limits() {
            for limits in [CanvasLimits::mobile(), CanvasLimits::desktop()] {
                let max_dimension = limits.max_dimension.unwrap_or(u32::MAX);
                assert!(max_dimension <= MAX_DIMENSION);
            }
        }
    }

    mod end_to_end {
        use super::*;

        #[test]
        fn test_facade_round_trip() {
            let compressor = Compressor::new(
                EngineConfig::default(),
                Arc::new(NativeEncoder),
                CompressionWorker::inline(),
            );
            let source = SourceImage::from_bytes("facade.png", create_png(40, 30));
            let settings = CompressionSettings::default()
                .with_format(OutputFormat::WebP)
                .with_width(20);
            let outcome = compressor.compress(&source, &settings).unwrap();
            assert_eq!(outcome.format, OutputFormat::WebP);
            assert_eq!((outcome.width, outcome.height), (20, 15));
            assert_eq!(outcome.file_name("facade.png", "compressed"), "facade-compressed.webp");
        }

        #[test]
        fn test_classify_and_select_agree_on_transparency() {
            let img = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
                8,
                8,
                image::Rgba([0, 0, 0, 10]),
            ));
            let result = classify_image(&img, &ClassifierThresholds::default());
            assert!(result.has_transparency);
            assert_eq!(
                select_format(result.is_text_like, OutputFormat::Jpeg, result.has_transparency),
                OutputFormat::WebP
            );
        }
    }
}
