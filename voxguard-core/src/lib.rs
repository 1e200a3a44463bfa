//! # voxguard-core
//!
//! Reusable synthetic-voice screening SDK.
//!
//! ## Architecture
//!
//! ```text
//! raw bytes → RawAudioClip (sniffed container)
//!                  │
//!            decode (hound / symphonia) → downmix → RateConverter (16 kHz)
//!                  │
//!            DecodedSignal ── duration < 0.5 s ──► AnalysisError::ClipTooShort
//!                  │
//!            FeatureExtractor → AcousticFeatures { rms, zcr, timbre_variance }
//!                  │
//!            RiskClassifier(ThresholdProfile) → ClassificationResult
//!                  │
//!            ClassificationReport / AnalysisOutcome (serde, host-facing)
//! ```
//!
//! Every stage is a pure function of its input. `Analyzer` holds only
//! immutable spectral tables and can be shared across threads.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod classify;
pub mod engine;
pub mod error;
pub mod features;
pub mod ipc;

// Convenience re-exports for downstream crates
pub use audio::{ContainerFormat, DecodedSignal, RawAudioClip};
pub use classify::{
    ClassificationResult, RiskClassifier, ThresholdPreset, ThresholdProfile, Verdict,
};
pub use engine::{analyze, Analyzer, AnalyzerConfig};
pub use error::{AnalysisError, ConfigError};
pub use features::{AcousticFeatures, FeatureExtractor};
pub use ipc::events::{AnalysisOutcome, ClassificationReport, ErrorKind};
