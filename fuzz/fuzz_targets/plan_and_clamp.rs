#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pixpress::engine::dimensions::is_upscale;
use pixpress::engine::{plan, CanvasLimits, DimensionRequest};
use pixpress::ResizeMode;

#[derive(Arbitrary, Debug)]
struct Input {
    source_w: u32,
    source_h: u32,
    width: Option<u32>,
    height: Option<u32>,
    maintain_aspect_ratio: bool,
    exact: bool,
    max_dimension: u32,
    max_pixels: u64,
}

fuzz_target!(|data: Input| {
    // Keep the clamp loop bounded.
    let source_w = data.source_w % 100_000 + 1;
    let source_h = data.source_h % 100_000 + 1;
    let req = DimensionRequest {
        width: data.width.map(|w| w % 100_000 + 1),
        height: data.height.map(|h| h % 100_000 + 1),
        maintain_aspect_ratio: data.maintain_aspect_ratio,
        mode: if data.exact { ResizeMode::Exact } else { ResizeMode::ShrinkToFit },
    };

    let planned = plan(source_w, source_h, &req);
    assert!(planned.width >= 1 && planned.height >= 1);
    if req.mode == ResizeMode::ShrinkToFit && req.maintain_aspect_ratio {
        assert!(!is_upscale(source_w, source_h, planned));
    }

    let limits = CanvasLimits::custom(
        data.max_dimension % 20_000 + 1,
        data.max_pixels % 400_000_000 + 1,
    );
    let clamped = limits.clamp(planned.width, planned.height);
    assert!(clamped.width >= 1 && clamped.height >= 1);
    if clamped.width > 1 || clamped.height > 1 {
        assert!(limits.permits(clamped.width, clamped.height));
    }
});
