//! Per-clip error taxonomy and retry classification.
//!
//! Operators and the writer surface failures as [`ClipError`]; the driver
//! consults [`classify`] and nothing else to choose retry vs dead-letter.

use thiserror::Error;

/// Failure raised while processing a single clip.
///
/// The first two variants are known-retryable, the next three are known
/// terminal. `Operator` carries unstructured foreign errors from the
/// operator boundary and is classified by message heuristics; everything
/// else falls through to `unknown` (terminal, fail fast on bugs).
#[derive(Debug, Clone, Error)]
pub enum ClipError {
    #[error("transient I/O failure: {0}")]
    TransientIo(String),

    #[error("out of memory: {0}")]
    OutOfMemory(String),

    #[error("video decode failure: {0}")]
    Decode(String),

    #[error("invalid input data: {0}")]
    InvalidData(String),

    #[error("missing model artifact: {0}")]
    ModelMissing(String),

    #[error("operator failure: {0}")]
    Operator(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ClipError {
    pub fn transient_io(msg: impl Into<String>) -> Self {
        Self::TransientIo(msg.into())
    }

    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    pub fn operator(msg: impl Into<String>) -> Self {
        Self::Operator(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Outcome of classifying a [`ClipError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorClass {
    pub retryable: bool,
    pub reason: &'static str,
}

impl ErrorClass {
    fn retryable(reason: &'static str) -> Self {
        Self {
            retryable: true,
            reason,
        }
    }

    fn terminal(reason: &'static str) -> Self {
        Self {
            retryable: false,
            reason,
        }
    }
}

/// Classify a clip error for the retry decision.
///
/// Rules, in order: known retryable kinds, known terminal kinds, then
/// case-insensitive message heuristics for foreign errors, defaulting to
/// terminal `unknown`.
pub fn classify(error: &ClipError) -> ErrorClass {
    match error {
        ClipError::TransientIo(_) => ErrorClass::retryable("transient_io"),
        ClipError::OutOfMemory(_) => ErrorClass::retryable("out_of_memory"),
        ClipError::Decode(_) => ErrorClass::terminal("decode"),
        ClipError::InvalidData(_) => ErrorClass::terminal("invalid_data"),
        ClipError::ModelMissing(_) => ErrorClass::terminal("model_missing"),
        ClipError::Operator(msg) | ClipError::Internal(msg) => classify_message(msg),
    }
}

fn classify_message(msg: &str) -> ErrorClass {
    let msg = msg.to_lowercase();
    if msg.contains("out of memory") {
        return ErrorClass::retryable("oom");
    }
    if msg.contains("cuda") && msg.contains("error") {
        return ErrorClass::retryable("cuda_error");
    }
    ErrorClass::terminal("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_kinds() {
        assert_eq!(
            classify(&ClipError::transient_io("read timed out")),
            ErrorClass::retryable("transient_io")
        );
        assert_eq!(
            classify(&ClipError::OutOfMemory("allocator".into())),
            ErrorClass::retryable("out_of_memory")
        );
        assert_eq!(
            classify(&ClipError::Decode("bad nal unit".into())),
            ErrorClass::terminal("decode")
        );
        assert_eq!(
            classify(&ClipError::invalid_data("negative duration")),
            ErrorClass::terminal("invalid_data")
        );
        assert_eq!(
            classify(&ClipError::ModelMissing("sam2.pt".into())),
            ErrorClass::terminal("model_missing")
        );
    }

    #[test]
    fn test_oom_heuristic_wins_over_cuda() {
        // "CUDA error: out of memory" matches the OOM rule first.
        let class = classify(&ClipError::operator("CUDA error: out of memory"));
        assert!(class.retryable);
        assert_eq!(class.reason, "oom");
    }

    #[test]
    fn test_cuda_heuristic() {
        let class = classify(&ClipError::operator("CUDA error: device-side assert"));
        assert!(class.retryable);
        assert_eq!(class.reason, "cuda_error");
    }

    #[test]
    fn test_heuristics_are_case_insensitive() {
        let class = classify(&ClipError::operator("Out Of Memory while upsampling"));
        assert_eq!(class.reason, "oom");
    }

    #[test]
    fn test_unknown_is_terminal() {
        let class = classify(&ClipError::internal("index out of bounds"));
        assert!(!class.retryable);
        assert_eq!(class.reason, "unknown");
    }
}
