// src/engine/classifier.rs
//
// Content classification: text/document vs photographic, plus transparency.
//
// Documents and screenshots are mostly flat (often white) with sharp
// high-contrast strokes; photographs vary smoothly with few flat regions.
// Statistics are computed on a small sample so the cost is constant no
// matter how large the source is.

use crate::engine::decoder;
use crate::engine::dimensions::CanvasLimits;
use crate::engine::resize::resize_view;
use image::{DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Heuristic thresholds. The defaults are the contract; change them only
/// as a product decision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierThresholds {
    /// Longest side of the analysed sample, per axis
    pub sample_side: u32,
    /// A channel above this counts toward "near white"
    pub white_level: u8,
    pub max_avg_variance: f64,
    pub min_white_ratio: f64,
    /// Adjacent-pixel difference (sum over RGB) that counts as an edge
    pub edge_diff: u32,
    pub min_edge_ratio: f64,
    pub high_contrast_diff: u32,
    pub min_high_contrast_ratio: f64,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            sample_side: 200,
            white_level: 240,
            max_avg_variance: 85.0,
            min_white_ratio: 0.25,
            edge_diff: 100,
            min_edge_ratio: 0.12,
            high_contrast_diff: 150,
            min_high_contrast_ratio: 0.08,
        }
    }
}

/// Raw pixel statistics of a sample.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ContentStats {
    pub white_ratio: f64,
    pub avg_variance: f64,
    pub edge_ratio: f64,
    pub high_contrast_ratio: f64,
    pub samples: usize,
}

impl ContentStats {
    pub fn is_text_like(&self, t: &ClassifierThresholds) -> bool {
        self.avg_variance < t.max_avg_variance
            && (self.white_ratio > t.min_white_ratio
                || (self.edge_ratio > t.min_edge_ratio
                    && self.high_contrast_ratio > t.min_high_contrast_ratio))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClassificationResult {
    pub is_text_like: bool,
    pub has_transparency: bool,
}

impl ClassificationResult {
    /// Used whenever analysis fails: take the photographic path.
    pub const CONSERVATIVE: ClassificationResult = ClassificationResult {
        is_text_like: false,
        has_transparency: false,
    };
}

/// Compute statistics over every pixel of `sample`.
pub fn measure(sample: &RgbaImage, t: &ClassifierThresholds) -> ContentStats {
    let (width, height) = sample.dimensions();
    let pixel_count = width as usize * height as usize;
    if pixel_count == 0 {
        return ContentStats::default();
    }

    let white = t.white_level;
    let mut white_pixels = 0usize;
    let mut diff_total = 0u64;
    let mut pairs = 0usize;
    let mut edges = 0usize;
    let mut high_contrast = 0usize;

    for row in sample.rows() {
        let mut prev: Option<[u8; 4]> = None;
        for px in row {
            let [r, g, b, _] = px.0;
            if r > white && g > white && b > white {
                white_pixels += 1;
            }
            if let Some([pr, pg, pb, _]) = prev {
                let diff = (r.abs_diff(pr) as u32)
                    + (g.abs_diff(pg) as u32)
                    + (b.abs_diff(pb) as u32);
                diff_total += diff as u64;
                pairs += 1;
                if diff > t.edge_diff {
                    edges += 1;
                }
                if diff > t.high_contrast_diff {
                    high_contrast += 1;
                }
            }
            prev = Some(px.0);
        }
    }

    let pair_count = pairs.max(1) as f64;
    ContentStats {
        white_ratio: white_pixels as f64 / pixel_count as f64,
        avg_variance: diff_total as f64 / pair_count,
        edge_ratio: edges as f64 / pair_count,
        high_contrast_ratio: high_contrast as f64 / pair_count,
        samples: pixel_count,
    }
}

/// Classify an already-sampled raster.
pub fn classify_raster(sample: &RgbaImage, t: &ClassifierThresholds) -> ClassificationResult {
    let stats = measure(sample, t);
    ClassificationResult {
        is_text_like: stats.is_text_like(t),
        has_transparency: sample.pixels().any(|p| p[3] < 255),
    }
}

/// Shrink each axis to at most `max_side`. Never upsamples.
///
/// Axes are capped independently, so the sample may be squashed; the
/// thresholds were tuned on exactly this kind of sample. The source is read
/// in place, never copied at full resolution.
pub fn sample_raster(img: &DynamicImage, max_side: u32) -> crate::error::Result<RgbaImage> {
    let (w, h) = (img.width(), img.height());
    let (sw, sh) = (w.min(max_side).max(1), h.min(max_side).max(1));
    if (sw, sh) == (w, h) {
        return Ok(img.to_rgba8());
    }
    let resized = resize_view(img, sw, sh, &CanvasLimits::unlimited())?;
    Ok(resized.into_rgba8())
}

/// Full-resolution alpha scan. Short-circuits on the first translucent pixel.
pub fn has_transparency(img: &DynamicImage) -> bool {
    if !img.color().has_alpha() {
        return false;
    }
    match img {
        DynamicImage::ImageRgba8(buf) => buf.as_raw().iter().skip(3).step_by(4).any(|&a| a < 255),
        DynamicImage::ImageLumaA8(buf) => buf.as_raw().iter().skip(1).step_by(2).any(|&a| a < 255),
        other => other.to_rgba8().pixels().any(|p| p[3] < 255),
    }
}

/// Classify a decoded image.
///
/// Statistics come from the sample; transparency is checked on the full
/// raster so a single translucent pixel cannot be averaged away before the
/// format decision.
pub fn classify_image(img: &DynamicImage, t: &ClassifierThresholds) -> ClassificationResult {
    let has_alpha = has_transparency(img);
    match sample_raster(img, t.sample_side) {
        Ok(sample) => {
            let stats = measure(&sample, t);
            let result = ClassificationResult {
                is_text_like: stats.is_text_like(t),
                has_transparency: has_alpha,
            };
            debug!(
                white_ratio = stats.white_ratio,
                avg_variance = stats.avg_variance,
                edge_ratio = stats.edge_ratio,
                high_contrast_ratio = stats.high_contrast_ratio,
                is_text_like = result.is_text_like,
                has_transparency = result.has_transparency,
                "classified content"
            );
            result
        }
        Err(err) => {
            warn!(error = %err, "sampling failed, treating image as photographic");
            ClassificationResult {
                has_transparency: has_alpha,
                ..ClassificationResult::CONSERVATIVE
            }
        }
    }
}

/// Classify encoded bytes. Never fails: undecodable input is photographic and opaque.
pub fn classify_bytes(bytes: &[u8], t: &ClassifierThresholds) -> ClassificationResult {
    match decoder::decode(bytes) {
        Ok(decoded) => classify_image(&decoded.image, t),
        Err(err) => {
            warn!(error = %err, "classification decode failed, using conservative default");
            ClassificationResult::CONSERVATIVE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn page(width: u32, height: u32) -> RgbaImage {
        // white page, thin black "glyph" bars in a few text lines
        RgbaImage::from_fn(width, height, |x, y| {
            let in_line = (y % 20) < 4;
            let in_glyph = (x % 9) < 2;
            let in_margin = x < width / 8 || x > width - width / 8;
            if in_line && in_glyph && !in_margin {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        })
    }

    fn photo(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            let noise = ((x * 31 + y * 17) % 23) as u8;
            Rgba([
                (40 + (x * 150 / width) as u8).saturating_add(noise),
                (30 + (y * 120 / height) as u8).saturating_add(noise),
                90u8.saturating_add(noise),
                255,
            ])
        })
    }

    #[test]
    fn white_page_with_strokes_is_text() {
        let t = ClassifierThresholds::default();
        let stats = measure(&page(200, 200), &t);
        assert!(stats.white_ratio > 0.25, "{stats:?}");
        assert!(stats.avg_variance < 85.0, "{stats:?}");
        assert!(classify_raster(&page(200, 200), &t).is_text_like);
    }

    #[test]
    fn smooth_photo_is_not_text() {
        let t = ClassifierThresholds::default();
        let result = classify_raster(&photo(200, 150), &t);
        assert!(!result.is_text_like);
        assert!(!result.has_transparency);
    }

    #[test]
    fn busy_high_contrast_noise_is_not_text() {
        // alternating black/white columns: every pair is an edge, variance is huge
        let img = RgbaImage::from_fn(100, 100, |x, _| {
            if x % 2 == 0 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        let t = ClassifierThresholds::default();
        let stats = measure(&img, &t);
        assert!(stats.avg_variance > 85.0);
        assert!(!stats.is_text_like(&t));
    }

    #[test]
    fn edge_rule_applies_without_white_background() {
        let t = ClassifierThresholds::default();
        let stats = ContentStats {
            white_ratio: 0.05,
            avg_variance: 60.0,
            edge_ratio: 0.13,
            high_contrast_ratio: 0.09,
            samples: 1,
        };
        assert!(stats.is_text_like(&t));
        let weak = ContentStats {
            high_contrast_ratio: 0.07,
            ..stats
        };
        assert!(!weak.is_text_like(&t));
    }

    #[test]
    fn thresholds_are_strict_inequalities() {
        let t = ClassifierThresholds::default();
        let at_limit = ContentStats {
            white_ratio: 0.25,
            avg_variance: 10.0,
            edge_ratio: 0.0,
            high_contrast_ratio: 0.0,
            samples: 1,
        };
        assert!(!at_limit.is_text_like(&t));
        let variance_limit = ContentStats {
            white_ratio: 0.9,
            avg_variance: 85.0,
            ..at_limit
        };
        assert!(!variance_limit.is_text_like(&t));
    }

    #[test]
    fn transparency_detected_from_any_alpha() {
        let mut img = RgbaImage::from_pixel(300, 300, Rgba([10, 10, 10, 255]));
        img.put_pixel(299, 299, Rgba([10, 10, 10, 254]));
        let dynamic = DynamicImage::ImageRgba8(img);
        assert!(has_transparency(&dynamic));
        let result = classify_image(&dynamic, &ClassifierThresholds::default());
        assert!(result.has_transparency);
    }

    #[test]
    fn rgb_images_are_opaque() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::new(4, 4));
        assert!(!has_transparency(&img));
    }

    #[test]
    fn sample_caps_each_axis() {
        let img = DynamicImage::ImageRgba8(photo(640, 120));
        let sample = sample_raster(&img, 200).unwrap();
        assert_eq!(sample.dimensions(), (200, 120));
        let small = DynamicImage::ImageRgba8(photo(50, 40));
        assert_eq!(sample_raster(&small, 200).unwrap().dimensions(), (50, 40));
    }

    #[test]
    fn sample_reads_large_rasters_in_place() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_fn(3000, 900, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 40])
        }));
        let sample = sample_raster(&img, 200).unwrap();
        assert_eq!(sample.dimensions(), (200, 200));
        assert_eq!(img.as_bytes().len(), 3000 * 900 * 3);
    }

    #[test]
    fn undecodable_bytes_fall_back_to_conservative() {
        let result = classify_bytes(b"not an image", &ClassifierThresholds::default());
        assert_eq!(result, ClassificationResult::CONSERVATIVE);
    }

    #[test]
    fn empty_sample_has_zero_stats() {
        let stats = measure(&RgbaImage::new(0, 0), &ClassifierThresholds::default());
        assert_eq!(stats.samples, 0);
    }
}
