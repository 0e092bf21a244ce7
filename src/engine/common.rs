// src/engine/common.rs
//
// Common utilities shared across engine modules.

use crate::error::PixpressError;
use std::panic::{catch_unwind, AssertUnwindSafe};

pub type EngineResult<T> = std::result::Result<T, PixpressError>;

/// Run a codec call, converting a panic into `InternalPanic`.
///
/// Native codecs (and the image crate on malformed input) occasionally panic
/// instead of returning an error. A panic must never cross the orchestrator
/// boundary, otherwise the queue item would stay in `Compressing`.
pub fn run_with_panic_policy<T, F>(stage: &'static str, f: F) -> EngineResult<T>
where
    F: FnOnce() -> EngineResult<T>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            tracing::warn!(stage, %detail, "codec panicked");
            Err(PixpressError::internal_panic(format!(
                "{stage} panicked: {detail}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    #[test]
    fn passes_through_results() {
        assert_eq!(run_with_panic_policy("ok", || Ok(3)).unwrap(), 3);
        let err = run_with_panic_policy::<(), _>("err", || {
            Err(PixpressError::decode_failed("bad"))
        })
        .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::CodecError);
    }

    #[test]
    fn converts_panics() {
        let err = run_with_panic_policy::<(), _>("encode:test", || panic!("boom")).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::InternalBug);
        assert!(err.to_string().contains("encode:test"));
        assert!(err.to_string().contains("boom"));
    }
}
