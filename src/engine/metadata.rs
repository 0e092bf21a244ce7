// src/engine/metadata.rs
//
// EXIF carry-over for runs with metadata kept.
//
// Re-encoding always drops metadata. When the user asks to keep it, the
// source EXIF segment is copied into the output container with img-parts.
// ICC profiles are not carried.

use crate::engine::common::{run_with_panic_policy, EngineResult};
use crate::error::PixpressError;
use img_parts::{Bytes, DynImage, ImageEXIF};
use tracing::{debug, warn};

/// Raw EXIF payload of a JPEG, PNG or WebP container.
pub fn extract_exif(data: &[u8]) -> Option<Vec<u8>> {
    let image = DynImage::from_bytes(Bytes::copy_from_slice(data)).ok()??;
    image.exif().map(|exif| exif.to_vec())
}

/// Insert `exif` into an encoded JPEG, PNG or WebP.
pub fn embed_exif(data: &[u8], exif: &[u8]) -> EngineResult<Vec<u8>> {
    run_with_panic_policy("metadata:embed_exif", || {
        let mut image = DynImage::from_bytes(Bytes::copy_from_slice(data))
            .map_err(|e| {
                PixpressError::decode_failed(format!("failed to parse container for EXIF: {e}"))
            })?
            .ok_or_else(|| PixpressError::unsupported_format("container without EXIF support"))?;
        image.set_exif(Some(Bytes::copy_from_slice(exif)));

        let mut output = Vec::with_capacity(data.len() + exif.len() + 16);
        image.encoder().write_to(&mut output).map_err(|e| {
            PixpressError::encode_failed(
                "exif",
                format!("failed to write container with EXIF: {e}"),
            )
        })?;
        Ok(output)
    })
}

/// Copy the EXIF of `source` into `output`. Returns `output` untouched when
/// there is nothing to copy or the container cannot carry it.
pub fn carry_exif(source: &[u8], output: Vec<u8>) -> Vec<u8> {
    let Some(exif) = extract_exif(source) else {
        return output;
    };
    match embed_exif(&output, &exif) {
        Ok(with_exif) => {
            debug!(exif_len = exif.len(), "carried EXIF to output");
            with_exif
        }
        Err(err) => {
            warn!(error = %err, "could not carry EXIF, metadata dropped");
            output
        }
    }
}
