// src/error.rs
//
// Unified error handling for pixpress
// Uses thiserror for simple, type-safe error handling
//
// Error Taxonomy:
// - UserError: Invalid input or settings, recoverable
// - CodecError: Format/encoding issues
// - ResourceLimit: Memory/dimension limits
// - InternalBug: Library bugs (should not happen)

use std::borrow::Cow;
use thiserror::Error;

/// Error taxonomy used by hosts to decide how to react.
///
/// - UserError: Invalid input, recoverable by user
/// - CodecError: Format/encoding issues
/// - ResourceLimit: Memory/dimension limits
/// - InternalBug: Library bugs (should not happen)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCategory {
    /// Invalid input, recoverable by user
    UserError,
    /// Format/encoding issues
    CodecError,
    /// Memory/dimension limits
    ResourceLimit,
    /// Library bugs (should not happen)
    InternalBug,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::UserError => "UserError",
            ErrorCategory::CodecError => "CodecError",
            ErrorCategory::ResourceLimit => "ResourceLimit",
            ErrorCategory::InternalBug => "InternalBug",
        }
    }
}

/// pixpress error types
#[derive(Debug, Clone, Error)]
pub enum PixpressError {
    // Input Errors
    #[error("Unsupported image format: {format}")]
    UnsupportedFormat { format: Cow<'static, str> },

    #[error("File '{name}' rejected: {reason}")]
    RejectedFile {
        name: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    #[error("Invalid value for {name}: {value}. {reason}")]
    InvalidArgument {
        name: Cow<'static, str>,
        value: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: Cow<'static, str> },

    // Decode Errors
    #[error("Failed to decode image: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    #[error("Corrupted image data")]
    CorruptedImage,

    // Size Limit Errors
    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    #[error("Could not allocate a {width}x{height} raster surface: {reason}")]
    CanvasAllocation {
        width: u32,
        height: u32,
        reason: Cow<'static, str>,
    },

    // Processing Errors
    #[error(
        "Crop bounds ({x}+{width}, {y}+{height}) exceed image dimensions ({img_width}x{img_height})"
    )]
    InvalidCropBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        img_width: u32,
        img_height: u32,
    },

    #[error("Invalid crop dimensions: width={width}, height={height}")]
    InvalidCropDimensions { width: u32, height: u32 },

    #[error("Invalid resize dimensions: width={width}, height={height}")]
    InvalidResizeDimensions { width: u32, height: u32 },

    #[error(
        "Resize failed ({source_width}x{source_height} -> {target_width}x{target_height}): \
         {message}"
    )]
    ResizeFailed {
        source_width: u32,
        source_height: u32,
        target_width: u32,
        target_height: u32,
        message: Cow<'static, str>,
    },

    // Encode Errors
    #[error("Failed to encode as {format}: {message}")]
    EncodeFailed {
        format: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    #[error("Encoder produced invalid {format} output: {message}")]
    InvalidEncoderOutput {
        format: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    // Internal Errors
    #[error("Internal error: {message}")]
    InternalPanic { message: Cow<'static, str> },
}

// Constructor Helpers
impl PixpressError {
    pub fn unsupported_format(format: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn rejected_file(
        name: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::RejectedFile {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_argument(
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_config(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn decode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn corrupted_image() -> Self {
        Self::CorruptedImage
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn canvas_allocation(
        width: u32,
        height: u32,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::CanvasAllocation {
            width,
            height,
            reason: reason.into(),
        }
    }

    pub fn invalid_crop_bounds(
        rect: (u32, u32, u32, u32),
        img_width: u32,
        img_height: u32,
    ) -> Self {
        let (x, y, width, height) = rect;
        Self::InvalidCropBounds {
            x,
            y,
            width,
            height,
            img_width,
            img_height,
        }
    }

    pub fn invalid_crop_dimensions(width: u32, height: u32) -> Self {
        Self::InvalidCropDimensions { width, height }
    }

    pub fn invalid_resize_dimensions(width: u32, height: u32) -> Self {
        Self::InvalidResizeDimensions { width, height }
    }

    pub fn resize_failed(
        source_dims: (u32, u32),
        target_dims: (u32, u32),
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::ResizeFailed {
            source_width: source_dims.0,
            source_height: source_dims.1,
            target_width: target_dims.0,
            target_height: target_dims.1,
            message: message.into(),
        }
    }

    pub fn encode_failed(
        format: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn invalid_encoder_output(
        format: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidEncoderOutput {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn internal_panic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InternalPanic {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable (user can fix it)
    ///
    /// Consistent with category(): UserError and ResourceLimit are recoverable
    /// (pick another file, a smaller image or a bigger device).
    pub fn is_recoverable(&self) -> bool {
        match self.category() {
            ErrorCategory::UserError | ErrorCategory::ResourceLimit => true,
            ErrorCategory::CodecError | ErrorCategory::InternalBug => false,
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::RejectedFile { .. }
            | Self::InvalidArgument { .. }
            | Self::InvalidConfig { .. }
            | Self::InvalidCropBounds { .. }
            | Self::InvalidCropDimensions { .. }
            | Self::InvalidResizeDimensions { .. } => ErrorCategory::UserError,

            Self::UnsupportedFormat { .. }
            | Self::DecodeFailed { .. }
            | Self::CorruptedImage
            | Self::EncodeFailed { .. }
            | Self::InvalidEncoderOutput { .. }
            | Self::ResizeFailed { .. } => ErrorCategory::CodecError,

            Self::DimensionExceedsLimit { .. }
            | Self::PixelCountExceedsLimit { .. }
            | Self::CanvasAllocation { .. } => ErrorCategory::ResourceLimit,

            Self::InternalPanic { .. } => ErrorCategory::InternalBug,
        }
    }
}

/// The handful of messages a user ever sees for a failed run.
///
/// Errors are collapsed into these at the orchestrator boundary so the UI
/// never has to understand codec internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserMessage {
    /// A raster surface could not be allocated.
    OutOfMemory,
    /// The image is larger than the engine will decode.
    OversizedImage,
    /// The file or settings were rejected before processing.
    InvalidInput,
    GenericFailure,
}

impl UserMessage {
    pub fn from_error(err: &PixpressError) -> Self {
        match err {
            PixpressError::CanvasAllocation { .. } => UserMessage::OutOfMemory,
            PixpressError::DimensionExceedsLimit { .. }
            | PixpressError::PixelCountExceedsLimit { .. } => UserMessage::OversizedImage,
            PixpressError::RejectedFile { .. }
            | PixpressError::InvalidArgument { .. }
            | PixpressError::InvalidCropBounds { .. }
            | PixpressError::InvalidCropDimensions { .. }
            | PixpressError::UnsupportedFormat { .. } => UserMessage::InvalidInput,
            _ => UserMessage::GenericFailure,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            UserMessage::OutOfMemory => "PIXPRESS_OUT_OF_MEMORY",
            UserMessage::OversizedImage => "PIXPRESS_OVERSIZED_IMAGE",
            UserMessage::InvalidInput => "PIXPRESS_INVALID_INPUT",
            UserMessage::GenericFailure => "PIXPRESS_FAILURE",
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            UserMessage::OutOfMemory => {
                "Your device ran out of memory while processing this image. \
                 Try a smaller image or a device with more memory."
            }
            UserMessage::OversizedImage => {
                "This image is too large to process. Resize it first or pick a smaller file."
            }
            UserMessage::InvalidInput => "This file type or setting is not supported here.",
            UserMessage::GenericFailure => "Something went wrong while processing the image.",
        }
    }
}

impl std::fmt::Display for UserMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text())
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, PixpressError>;
