#![no_main]

use image::RgbaImage;
use libfuzzer_sys::fuzz_target;
use pixpress::engine::classifier::{classify_raster, measure};
use pixpress::engine::ClassifierThresholds;

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let width = data[0] as u32 % 64 + 1;
    let height = data[1] as u32 % 64 + 1;
    let pixels = &data[2..];
    let mut buffer = vec![0u8; (width * height * 4) as usize];
    if !pixels.is_empty() {
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = pixels[i % pixels.len()];
        }
    }
    let Some(img) = RgbaImage::from_raw(width, height, buffer) else {
        return;
    };

    let t = ClassifierThresholds::default();
    let stats = measure(&img, &t);
    assert!((0.0..=1.0).contains(&stats.white_ratio));
    assert!((0.0..=1.0).contains(&stats.edge_ratio));
    assert!(stats.high_contrast_ratio <= stats.edge_ratio);
    assert!(stats.avg_variance <= 765.0);

    let result = classify_raster(&img, &t);
    assert_eq!(result.has_transparency, img.pixels().any(|p| p[3] < 255));
});
