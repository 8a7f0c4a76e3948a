/// Failures a caller may want to tell apart. They travel inside `anyhow::Error` and can be
/// recovered with `downcast_ref::<RetextError>()`.
#[derive(Debug, thiserror::Error)]
pub enum RetextError {
    #[error("unsupported input: {file}")]
    UnsupportedFormat { file: String },

    #[error("no codec available for {kind} input: {file}")]
    CodecUnavailable { kind: String, file: String },

    #[error("translation batch misaligned after {attempts} attempt(s): expected {expected}, got {got}")]
    BatchMisaligned {
        attempts: usize,
        expected: usize,
        got: usize,
    },

    #[error("extraction digest mismatch: dump was made from a different document")]
    DigestMismatch,
}
