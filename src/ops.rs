// src/ops.rs
//
// Compression settings and output container types.
// These are plain values - cheap to clone, replaced wholesale on every UI change.

use crate::error::PixpressError;
use serde::{Deserialize, Serialize};

/// Output container for encoding.
///
/// Closed set: every match over it is exhaustive, so adding a container
/// forces the selector and converter to decide what to do with it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputFormat {
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/webp")]
    WebP,
    #[serde(rename = "image/avif")]
    Avif,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Jpeg,
        OutputFormat::Png,
        OutputFormat::WebP,
        OutputFormat::Avif,
    ];

    pub fn mime(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::WebP => "image/webp",
            OutputFormat::Avif => "image/avif",
        }
    }

    /// File extension used for downloads
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
            OutputFormat::Avif => "avif",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
            OutputFormat::Avif => "avif",
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" | "image/jfif" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::WebP),
            "image/avif" => Some(Self::Avif),
            _ => None,
        }
    }

    /// Parse a format name, extension or MIME type.
    pub fn parse(value: &str) -> Result<Self, PixpressError> {
        let lower = value.trim().trim_start_matches('.').to_ascii_lowercase();
        let parsed = match lower.as_str() {
            "jpeg" | "jpg" | "jfif" | "jpe" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            "avif" => Some(Self::Avif),
            other => Self::from_mime(other),
        };
        parsed.ok_or_else(|| PixpressError::unsupported_format(value.to_string()))
    }

    pub fn supports_alpha(&self) -> bool {
        match self {
            OutputFormat::Jpeg => false,
            OutputFormat::Png | OutputFormat::WebP | OutputFormat::Avif => true,
        }
    }

    /// True when the container never discards pixel data at any quality.
    pub fn is_lossless(&self) -> bool {
        match self {
            OutputFormat::Png => true,
            OutputFormat::Jpeg | OutputFormat::WebP | OutputFormat::Avif => false,
        }
    }

    /// Detect the container from magic bytes.
    ///
    /// This is the only source of truth for "what did the encoder actually
    /// produce" - declared types are never trusted.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.len() >= 3 && data[0] == 0xFF && data[1] == 0xD8 && data[2] == 0xFF {
            return Some(Self::Jpeg);
        }
        if data.len() >= 8 && data[..8] == [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A] {
            return Some(Self::Png);
        }
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }
        if is_avif_container(data) {
            return Some(Self::Avif);
        }
        None
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// ISOBMFF `ftyp` box with an `avif`/`avis` major or compatible brand.
fn is_avif_container(data: &[u8]) -> bool {
    if data.len() < 16 || &data[4..8] != b"ftyp" {
        return false;
    }
    let box_len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let box_end = box_len.min(data.len());
    let is_avif_brand = |brand: &[u8]| brand == b"avif" || brand == b"avis";
    if is_avif_brand(&data[8..12]) {
        return true;
    }
    // compatible brands follow major brand (4) + minor version (4)
    data.get(16..box_end)
        .map(|brands| brands.chunks_exact(4).any(is_avif_brand))
        .unwrap_or(false)
}

/// How an explicit width/height is interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResizeMode {
    /// Treat the dimensions as an upper bound: only ever scale down.
    #[default]
    ShrinkToFit,
    /// Honor the requested dimensions, scaling up if needed.
    Exact,
}

/// User-facing compression settings.
///
/// Invariant: width/height, if present, are positive. With both present and
/// `maintain_aspect_ratio` set, the image is fit inside the box.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompressionSettings {
    /// Slider value 1-100
    pub quality: u8,
    pub format: OutputFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub maintain_aspect_ratio: bool,
    pub strip_metadata: bool,
    /// When false the engine only resizes/re-containers at full fidelity.
    pub enable_compression: bool,
    pub resize_mode: ResizeMode,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            quality: 80,
            format: OutputFormat::Jpeg,
            width: None,
            height: None,
            maintain_aspect_ratio: true,
            strip_metadata: true,
            enable_compression: true,
            resize_mode: ResizeMode::ShrinkToFit,
        }
    }
}

impl CompressionSettings {
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    pub fn resize_requested(&self) -> bool {
        self.width.is_some() || self.height.is_some()
    }

    pub fn validate(&self) -> Result<(), PixpressError> {
        if !(1..=100).contains(&self.quality) {
            return Err(PixpressError::invalid_argument(
                "quality",
                self.quality.to_string(),
                "Expected an integer between 1 and 100",
            ));
        }
        if self.width == Some(0) {
            return Err(PixpressError::invalid_argument(
                "width",
                "0",
                "Width must be a positive integer",
            ));
        }
        if self.height == Some(0) {
            return Err(PixpressError::invalid_argument(
                "height",
                "0",
                "Height must be a positive integer",
            ));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, PixpressError> {
        let settings: Self = serde_json::from_str(json).map_err(|e| {
            PixpressError::invalid_argument("settings", json.to_string(), e.to_string())
        })?;
        settings.validate()?;
        Ok(settings)
    }
}

// =============================================================================
// PRESETS - Named starting points offered next to the slider
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preset {
    /// Quality 70 JPEG, the recommended default
    Safe,
    /// Quality 55 WebP
    Balanced,
    /// Quality 40 WebP capped at 1600px wide
    Aggressive,
    /// Quality 30 WebP capped at 1200px wide
    Maximum,
}

impl Preset {
    pub const ALL: [Preset; 4] = [
        Preset::Safe,
        Preset::Balanced,
        Preset::Aggressive,
        Preset::Maximum,
    ];

    pub fn get(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "safe" => Some(Self::Safe),
            "balanced" => Some(Self::Balanced),
            "aggressive" => Some(Self::Aggressive),
            "maximum" => Some(Self::Maximum),
            _ => None,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Preset::Safe => "safe",
            Preset::Balanced => "balanced",
            Preset::Aggressive => "aggressive",
            Preset::Maximum => "maximum",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Preset::Safe => "Safe (Recommended)",
            Preset::Balanced => "Balanced",
            Preset::Aggressive => "Aggressive",
            Preset::Maximum => "Maximum",
        }
    }

    pub fn settings(&self) -> CompressionSettings {
        let base = CompressionSettings::default();
        match self {
            Preset::Safe => base.with_quality(70).with_format(OutputFormat::Jpeg),
            Preset::Balanced => base.with_quality(55).with_format(OutputFormat::WebP),
            Preset::Aggressive => base
                .with_quality(40)
                .with_format(OutputFormat::WebP)
                .with_width(1600),
            Preset::Maximum => base
                .with_quality(30)
                .with_format(OutputFormat::WebP)
                .with_width(1200),
        }
    }
}
