use thiserror::Error;

/// Errors returned by a single `analyze` invocation.
///
/// Neither variant is fatal to the host: both are ordinary values the caller
/// renders as guidance ("try again", "record longer").
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("could not decode audio: {cause}")]
    Decode { cause: String },

    #[error("clip too short: {actual_seconds:.2} s (minimum {min_seconds:.2} s)")]
    ClipTooShort {
        min_seconds: f64,
        actual_seconds: f64,
    },
}

impl AnalysisError {
    pub(crate) fn decode(cause: impl std::fmt::Display) -> Self {
        Self::Decode {
            cause: cause.to_string(),
        }
    }
}

/// Rejected `AnalyzerConfig` values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("target sample rate must be non-zero")]
    ZeroSampleRate,

    #[error("hop length must be non-zero")]
    ZeroHop,

    #[error("frame length {0} is below the 512-sample minimum")]
    FrameTooShort(usize),

    #[error("n_mfcc ({n_mfcc}) exceeds n_mels ({n_mels})")]
    TooManyCoefficients { n_mfcc: usize, n_mels: usize },

    #[error("minimum duration must be a positive number of seconds, got {0}")]
    InvalidMinDuration(f64),

    #[error("threshold `{name}` must be finite, got {value}")]
    NonFiniteThreshold { name: &'static str, value: f32 },
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
