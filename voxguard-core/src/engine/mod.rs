//! `Analyzer`: the bytes → report entry point.
//!
//! ## Stages
//!
//! ```text
//! Analyzer::analyze(bytes, label)
//!     └─► audio::decode        → DecodedSignal (16 kHz mono)     ── AnalysisError::Decode
//!         └─► duration guard                                     ── AnalysisError::ClipTooShort
//!             └─► FeatureExtractor::extract → AcousticFeatures
//!                 └─► RiskClassifier::classify → ClassificationReport
//! ```
//!
//! ## Threading
//!
//! `Analyzer` is `Send + Sync` and holds only immutable tables, so a single
//! `Arc<Analyzer>` can serve concurrent callers. `analyze_async` moves the
//! CPU-bound work onto tokio's blocking pool for event-driven hosts.

use std::sync::{Arc, OnceLock};

use tracing::{debug, info};

use crate::{
    audio::{self, DecodedSignal, RawAudioClip},
    classify::{RiskClassifier, ThresholdProfile},
    error::{AnalysisError, ConfigError, Result},
    features::{AcousticFeatures, FeatureExtractor},
    ipc::events::ClassificationReport,
};

/// Configuration for `Analyzer`.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Rate every clip is normalised to before feature extraction (Hz).
    /// Default: 16000.
    pub target_sample_rate: u32,
    /// Clips shorter than this are rejected before feature extraction.
    /// Default: 0.5 s.
    pub min_duration_secs: f64,
    /// Analysis frame (and FFT) length in samples. Default: 2048.
    pub frame_length: usize,
    /// Frame stride in samples. Default: 512.
    pub hop_length: usize,
    /// Mel bands feeding the cepstrum. Default: 128.
    pub n_mels: usize,
    /// Cepstral coefficients kept per frame. Default: 13.
    pub n_mfcc: usize,
    pub thresholds: ThresholdProfile,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16_000,
            min_duration_secs: 0.5,
            frame_length: 2048,
            hop_length: 512,
            n_mels: 128,
            n_mfcc: 13,
            thresholds: ThresholdProfile::default(),
        }
    }
}

impl AnalyzerConfig {
    pub fn with_thresholds(mut self, thresholds: ThresholdProfile) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.target_sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if self.hop_length == 0 {
            return Err(ConfigError::ZeroHop);
        }
        if self.frame_length < 512 {
            return Err(ConfigError::FrameTooShort(self.frame_length));
        }
        if self.n_mfcc > self.n_mels {
            return Err(ConfigError::TooManyCoefficients {
                n_mfcc: self.n_mfcc,
                n_mels: self.n_mels,
            });
        }
        if !(self.min_duration_secs.is_finite() && self.min_duration_secs > 0.0) {
            return Err(ConfigError::InvalidMinDuration(self.min_duration_secs));
        }
        self.thresholds.validate()
    }
}

/// Decodes, measures and classifies clips. Stateless between calls.
pub struct Analyzer {
    config: AnalyzerConfig,
    extractor: FeatureExtractor,
    classifier: RiskClassifier,
}

impl Analyzer {
    /// Build an analyzer, precomputing the spectral tables.
    ///
    /// # Errors
    /// `ConfigError` if the configuration cannot produce meaningful features.
    pub fn new(config: AnalyzerConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: AnalyzerConfig) -> Self {
        let extractor = FeatureExtractor::new(
            config.target_sample_rate,
            config.frame_length,
            config.hop_length,
            config.n_mels,
            config.n_mfcc,
        );
        let classifier = RiskClassifier::new(config.thresholds);
        debug!(?config, "analyzer ready");
        Self {
            config,
            extractor,
            classifier,
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyze raw bytes, sniffing the container from magic bytes.
    pub fn analyze(&self, raw_bytes: &[u8], source_label: &str) -> Result<ClassificationReport> {
        self.analyze_clip(RawAudioClip::new(raw_bytes), source_label)
    }

    /// Analyze a clip whose container format is already known.
    pub fn analyze_clip(
        &self,
        clip: RawAudioClip,
        source_label: &str,
    ) -> Result<ClassificationReport> {
        let signal = audio::decode(clip, self.config.target_sample_rate)?;
        self.analyze_signal(&signal, source_label)
    }

    /// Run the guard, extraction and classification on an already-decoded signal.
    ///
    /// Signals at any other rate than `target_sample_rate` are resampled first.
    pub fn analyze_signal(
        &self,
        signal: &DecodedSignal,
        source_label: &str,
    ) -> Result<ClassificationReport> {
        let target_rate = self.config.target_sample_rate;
        let converted;
        let signal = if signal.sample_rate == target_rate {
            signal
        } else if signal.sample_rate == 0 {
            return Err(AnalysisError::decode("signal declares a 0 Hz sample rate"));
        } else {
            let samples = audio::resample(&signal.samples, signal.sample_rate, target_rate)?;
            converted = DecodedSignal::new(samples, target_rate);
            &converted
        };

        let features = self.features(signal)?;
        let result = self.classifier.classify(&features);

        info!(
            source = source_label,
            duration_secs = signal.duration_secs(),
            rms = features.rms,
            zcr = features.zcr,
            timbre_variance = features.timbre_variance,
            score = result.score,
            verdict = %result.verdict,
            "clip classified"
        );

        Ok(ClassificationReport::new(
            source_label,
            signal.duration_secs(),
            features,
            result,
        ))
    }

    /// Minimum-length guard followed by feature extraction.
    pub fn features(&self, signal: &DecodedSignal) -> Result<AcousticFeatures> {
        let actual_seconds = signal.duration_secs();
        if actual_seconds < self.config.min_duration_secs {
            debug!(actual_seconds, "clip below minimum duration");
            return Err(AnalysisError::ClipTooShort {
                min_seconds: self.config.min_duration_secs,
                actual_seconds,
            });
        }
        Ok(self.extractor.extract(signal))
    }

    /// `analyze` on tokio's blocking pool.
    pub async fn analyze_async(
        self: Arc<Self>,
        raw_bytes: Vec<u8>,
        source_label: String,
    ) -> Result<ClassificationReport> {
        self.analyze_clip_async(RawAudioClip::new(raw_bytes), source_label)
            .await
    }

    /// `analyze_clip` on tokio's blocking pool.
    ///
    /// # Panics
    /// Resumes the panic if the analysis itself panicked.
    pub async fn analyze_clip_async(
        self: Arc<Self>,
        clip: RawAudioClip,
        source_label: String,
    ) -> Result<ClassificationReport> {
        let joined =
            tokio::task::spawn_blocking(move || self.analyze_clip(clip, &source_label)).await;
        match joined {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(AnalysisError::decode(format!("analysis task cancelled: {e}"))),
        }
    }
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Analyze with the default configuration.
///
/// The default `Analyzer` is built on first use and shared afterwards.
pub fn analyze(raw_bytes: &[u8], source_label: &str) -> Result<ClassificationReport> {
    static DEFAULT: OnceLock<Analyzer> = OnceLock::new();
    DEFAULT
        .get_or_init(|| Analyzer::build(AnalyzerConfig::default()))
        .analyze(raw_bytes, source_label)
}
