// src/engine/orchestrator.rs
//
// One compression run: decode, classify, plan, then the candidate chain.
//
// The candidate starts as the source bytes and is only ever replaced by
// something that is either smaller or needed (resize, format change).
// Library compression runs on the compression worker; its failures are
// logged and skipped. Decode and surface failures abort the run.

use crate::engine::classifier::{classify_image, ClassificationResult};
use crate::engine::common::run_with_panic_policy;
use crate::engine::config::EngineConfig;
use crate::engine::convert::{convert_image, encode_validated, ConvertFallback};
use crate::engine::decoder;
use crate::engine::dimensions::{is_upscale, plan, DimensionRequest};
use crate::engine::encoder::{NativeEncoder, RasterEncoder};
use crate::engine::io::{output_file_name, SourceImage};
use crate::engine::library;
use crate::engine::metadata::carry_exif;
use crate::engine::pool::CompressionWorker;
use crate::engine::quality::effective_quality;
use crate::engine::resize::resize_image;
use crate::engine::selector::select_format;
use crate::error::Result;
use crate::ops::{CompressionSettings, OutputFormat};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Something worth telling the user about a finished run.
#[derive(Clone, Debug, PartialEq)]
pub enum Diagnostic {
    /// The decoded source exceeded the canvas ceiling
    SourceClamped { from: (u32, u32), to: (u32, u32) },
    /// The planned target exceeded the canvas ceiling
    TargetClamped { from: (u32, u32), to: (u32, u32) },
    /// Upscaling turned compression off for this run
    CompressionAutoDisabled,
    LibrarySkipped { reason: String },
    FormatFallback(ConvertFallback),
    /// The re-encode was larger, the source bytes were kept
    KeptOriginal,
    MetadataCarried,
}

#[derive(Clone, Debug)]
pub struct EncodingOutcome {
    pub data: Vec<u8>,
    /// Sniffed from `data`
    pub format: OutputFormat,
    /// What the selector asked for; differs from `format` after a fallback
    pub selected_format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub original_size: usize,
    /// Quality handed to the encoders (0.0-1.0)
    pub quality: f32,
    pub classification: ClassificationResult,
    /// The run turned `enable_compression` off; hosts write this back
    pub compression_auto_disabled: bool,
    pub clamped: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl EncodingOutcome {
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn bytes_saved(&self) -> i64 {
        self.original_size as i64 - self.data.len() as i64
    }

    /// Size reduction in percent; negative when the output grew.
    pub fn savings_percent(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        self.bytes_saved() as f64 / self.original_size as f64 * 100.0
    }

    pub fn file_name(&self, original_name: &str, suffix: &str) -> String {
        output_file_name(original_name, suffix, self.format)
    }
}

/// Runs the compression pipeline with a fixed configuration.
#[derive(Clone)]
pub struct Compressor {
    config: EngineConfig,
    encoder: Arc<dyn RasterEncoder>,
    worker: CompressionWorker,
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new(EngineConfig::default(), Arc::new(NativeEncoder), CompressionWorker::global())
    }
}

impl std::fmt::Debug for Compressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compressor")
            .field("config", &self.config)
            .field("worker", &self.worker)
            .finish_non_exhaustive()
    }
}

impl Compressor {
    pub fn new(
        config: EngineConfig,
        encoder: Arc<dyn RasterEncoder>,
        worker: CompressionWorker,
    ) -> Self {
        Self {
            config,
            encoder,
            worker,
        }
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn encoder(&self) -> &dyn RasterEncoder {
        self.encoder.as_ref()
    }

    pub fn compress(
        &self,
        source: &SourceImage,
        settings: &CompressionSettings,
    ) -> Result<EncodingOutcome> {
        settings.validate()?;
        let config = &self.config;
        let limits = &config.canvas;
        let original = source.data();
        let mut diagnostics = Vec::new();

        let decoded = decoder::decode(original)?;
        let source_format = decoded.format;
        let orientation_applied = decoded.orientation_applied;
        let (src_w, src_h) = decoded.dimensions();

        let classification = classify_image(&decoded.image, &config.classifier);

        let mut working = decoded.image;
        let source_clamp = limits.clamp(src_w, src_h);
        if source_clamp.was_clamped {
            working = resize_image(working, source_clamp.width, source_clamp.height, limits)?;
            diagnostics.push(Diagnostic::SourceClamped {
                from: (src_w, src_h),
                to: (source_clamp.width, source_clamp.height),
            });
        }

        let request = DimensionRequest {
            width: settings.width,
            height: settings.height,
            maintain_aspect_ratio: settings.maintain_aspect_ratio,
            mode: settings.resize_mode,
        };
        let planned = plan(src_w, src_h, &request);
        let upscaling = request.is_resize() && is_upscale(src_w, src_h, planned);

        let mut compression_enabled = settings.enable_compression;
        let mut compression_auto_disabled = false;
        if upscaling && compression_enabled {
            info!(
                src_width = src_w,
                src_height = src_h,
                dst_width = planned.width,
                dst_height = planned.height,
                "upscaling, compression disabled for this run"
            );
            compression_enabled = false;
            compression_auto_disabled = true;
            diagnostics.push(Diagnostic::CompressionAutoDisabled);
        }

        let quality = effective_quality(
            &config.curve,
            &config.floors,
            settings.quality,
            classification.is_text_like,
            compression_enabled,
        );
        let selected = select_format(
            classification.is_text_like,
            settings.format,
            classification.has_transparency,
        );

        let resize_requested = settings.resize_requested();
        let raster_changed = resize_requested || source_clamp.was_clamped;
        let mut candidate = original.to_vec();

        if resize_requested {
            let target = limits.clamp(planned.width, planned.height);
            if target.was_clamped {
                diagnostics.push(Diagnostic::TargetClamped {
                    from: (planned.width, planned.height),
                    to: (target.width, target.height),
                });
            }
            working = resize_image(working, target.width, target.height, limits)?;
        }
        if raster_changed {
            candidate = encode_validated(&working, OutputFormat::Png, 1.0, self.encoder.as_ref())?;
        }

        let library_wanted = compression_enabled && (raster_changed || settings.quality < 100);
        if library_wanted && !self.encoder.supports(selected) {
            debug!(format = selected.name(), "encoder lacks format, skipping library compression");
            diagnostics.push(Diagnostic::LibrarySkipped {
                reason: format!("{} is not supported by the encoder", selected.name()),
            });
        } else if library_wanted {
            let floor = config.floors.floor_for(classification.is_text_like);
            let opts = config.library;
            let image = &working;
            let result = self.worker.run(move || {
                run_with_panic_policy("library", || {
                    library::compress(image, selected, quality, floor, &opts)
                })
            });
            match result {
                Ok(out) if out.data.len() < candidate.len() || raster_changed => {
                    debug!(
                        size = out.data.len(),
                        quality = out.quality,
                        iterations = out.iterations,
                        "library output accepted"
                    );
                    candidate = out.data;
                }
                Ok(out) => {
                    debug!(
                        size = out.data.len(),
                        candidate = candidate.len(),
                        "library output larger, ignored"
                    );
                }
                Err(err) => {
                    warn!(
                        format = selected.name(),
                        error = %err,
                        "library compression failed, skipping"
                    );
                    diagnostics.push(Diagnostic::LibrarySkipped {
                        reason: err.to_string(),
                    });
                }
            }
        }

        let candidate_format = OutputFormat::sniff(&candidate);
        if candidate_format != Some(selected) || (!compression_enabled && raster_changed) {
            let converted =
                convert_image(&working, &candidate, selected, quality, self.encoder.as_ref());
            if converted.fallback != ConvertFallback::None {
                diagnostics.push(Diagnostic::FormatFallback(converted.fallback));
            }
            candidate = converted.data;
        }

        if !settings.strip_metadata && orientation_applied.is_none() && candidate != original {
            let before = candidate.len();
            candidate = carry_exif(original, candidate);
            if candidate.len() != before {
                diagnostics.push(Diagnostic::MetadataCarried);
            }
        }

        let format_changed = source_format != Some(selected);
        if !resize_requested
            && !format_changed
            && compression_enabled
            && candidate.len() > original.len()
        {
            debug!(
                candidate = candidate.len(),
                original = original.len(),
                "output larger than source, keeping source"
            );
            candidate = original.to_vec();
            diagnostics.push(Diagnostic::KeptOriginal);
        }

        let format = OutputFormat::sniff(&candidate).unwrap_or(selected);
        let (width, height) = if candidate == original {
            (src_w, src_h)
        } else {
            decoder::read_dimensions(&candidate).unwrap_or((working.width(), working.height()))
        };

        info!(
            name = %source.name,
            original_size = original.len(),
            size = candidate.len(),
            format = format.name(),
            width,
            height,
            quality,
            "compression finished"
        );

        Ok(EncodingOutcome {
            data: candidate,
            format,
            selected_format: selected,
            width,
            height,
            original_size: original.len(),
            quality,
            classification,
            compression_auto_disabled,
            clamped: source_clamp.was_clamped
                || diagnostics
                    .iter()
                    .any(|d| matches!(d, Diagnostic::TargetClamped { .. })),
            diagnostics,
        })
    }
}
