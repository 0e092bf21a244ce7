// src/engine/selector.rs

use crate::ops::OutputFormat;

/// Pick the output format for a run.
///
/// The user's choice wins unless it would destroy transparency: JPEG has
/// no alpha channel, so translucent content goes to WebP instead.
/// `is_text_like` is part of the signature so callers pass the full
/// classification; it does not currently change the result.
pub fn select_format(
    _is_text_like: bool,
    user_format: OutputFormat,
    has_transparency: bool,
) -> OutputFormat {
    match user_format {
        OutputFormat::Jpeg if has_transparency => OutputFormat::WebP,
        OutputFormat::Jpeg => OutputFormat::Jpeg,
        OutputFormat::Png => OutputFormat::Png,
        OutputFormat::WebP => OutputFormat::WebP,
        OutputFormat::Avif => OutputFormat::Avif,
    }
}
