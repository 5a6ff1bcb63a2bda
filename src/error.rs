use thiserror::Error;

use crate::probe::EngineVersion;

/// Errors raised while setting up or talking to the external OCR engine.
///
/// Startup problems (`Unavailable`, `VersionTooOld`, `InvalidThreadLimit`)
/// are fatal before any page work begins. `DetectionFailed` is recovered
/// locally by callers with a safe default and never escalates.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cannot run OCR engine `{program}`: {source}")]
    Unavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("OCR engine version {found} is too old; {need} or newer is required")]
    VersionTooOld {
        found: EngineVersion,
        need: EngineVersion,
    },

    #[error("cannot parse OCR engine version from output: {output:?}")]
    VersionUnparseable { output: String },

    #[error("OMP_THREAD_LIMIT is set to {value:?}, which is not a non-negative integer")]
    InvalidThreadLimit { value: String },

    #[error("orientation detection failed: {0}")]
    DetectionFailed(String),
}
