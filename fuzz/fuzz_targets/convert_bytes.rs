#![no_main]

use libfuzzer_sys::fuzz_target;
use pixpress::engine::{convert, CanvasLimits, ConvertFallback, NativeEncoder};
use pixpress::OutputFormat;

fuzz_target!(|data: &[u8]| {
    let Some((&selector, bytes)) = data.split_first() else {
        return;
    };
    let target = OutputFormat::ALL[selector as usize % OutputFormat::ALL.len()];
    let limits = CanvasLimits::custom(512, 262_144);

    let converted = convert(bytes, target, 0.8, &NativeEncoder, &limits);
    match converted.fallback {
        ConvertFallback::Original => assert_eq!(converted.data, bytes),
        _ => assert_eq!(OutputFormat::sniff(&converted.data), converted.format),
    }
});
