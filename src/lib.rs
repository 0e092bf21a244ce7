// lib.rs
//
// pixpress: an adaptive image compression engine.
//
// Design goals:
// - Content-aware quality (text stays crisp, photos compress hard)
// - Never bigger than the input when nothing else was asked for
// - Never flatten transparency into JPEG
// - Stay inside what a constrained device can allocate

pub mod engine;
pub mod error;
pub mod ops;

use image::ImageReader;
use std::io::Cursor;

pub use engine::{
    AcceptPolicy, Compressor, CropRect, EncodingOutcome, EngineConfig, FileQueue, ObjectUrlRegistry,
    Session, SourceImage,
};
pub use error::{PixpressError, Result, UserMessage};
pub use ops::{CompressionSettings, OutputFormat, Preset, ResizeMode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectMetadata {
    pub width: u32,
    pub height: u32,
    pub format: Option<OutputFormat>,
}

/// Read dimensions and container from the header without decoding pixels.
pub fn inspect_header_from_bytes(data: &[u8]) -> Result<InspectMetadata> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| PixpressError::decode_failed(format!("failed to read image header: {e}")))?;
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| PixpressError::decode_failed(format!("failed to read dimensions: {e}")))?;
    Ok(InspectMetadata {
        width,
        height,
        format: OutputFormat::sniff(data),
    })
}

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn supported_input_formats() -> &'static [OutputFormat] {
    &[OutputFormat::Jpeg, OutputFormat::Png, OutputFormat::WebP]
}

/// Formats the native encoder can produce in this build.
pub fn supported_output_formats() -> Vec<OutputFormat> {
    use engine::RasterEncoder;
    OutputFormat::ALL
        .iter()
        .copied()
        .filter(|&f| engine::NativeEncoder.supports(f))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inspect_reads_header() {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(7, 3));
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png).unwrap();
        let meta = inspect_header_from_bytes(&png).unwrap();
        assert_eq!((meta.width, meta.height), (7, 3));
        assert_eq!(meta.format, Some(OutputFormat::Png));
    }

    #[test]
    fn inspect_rejects_garbage() {
        assert!(inspect_header_from_bytes(b"nope").is_err());
    }

    #[test]
    fn output_formats_follow_features() {
        let formats = supported_output_formats();
        assert!(formats.contains(&OutputFormat::WebP));
        assert_eq!(formats.contains(&OutputFormat::Avif), cfg!(feature = "avif"));
        assert!(!version().is_empty());
    }
}
