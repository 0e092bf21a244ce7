#![no_main]

use libfuzzer_sys::fuzz_target;
use pixpress::engine::{
    CanvasLimits, CompressionWorker, Compressor, EngineConfig, NativeEncoder, SourceImage,
};
use pixpress::{CompressionSettings, OutputFormat};
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let config = EngineConfig {
        canvas: CanvasLimits::custom(512, 262_144),
        ..EngineConfig::default()
    };
    let compressor = Compressor::new(config, Arc::new(NativeEncoder), CompressionWorker::inline());
    let settings = CompressionSettings::default()
        .with_quality(data[0] % 100 + 1)
        .with_format(OutputFormat::ALL[data[1] as usize % OutputFormat::ALL.len()]);
    let source = SourceImage::from_bytes("fuzz", data[2..].to_vec());

    // Errors are fine; panics and oversized outputs are not.
    if let Ok(outcome) = compressor.compress(&source, &settings) {
        assert!(!outcome.data.is_empty());
        assert!(outcome.width <= 512 && outcome.height <= 512 || outcome.data == source.data());
    }
});
