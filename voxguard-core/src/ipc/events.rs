//! Host-facing result types.
//!
//! Everything here is `Serialize` with camelCase fields so a presentation
//! layer (CLI, web view, desktop shell) can render it without depending on
//! the pipeline internals.
//!
//! | Type | Shape |
//! |------|-------|
//! | `ClassificationReport` | features, score, reasons, verdict, headline text |
//! | `AnalysisOutcome` | `{"status":"ok","report":…}` or `{"status":"error",…}` |

use serde::{Deserialize, Serialize};

use crate::classify::{ClassificationResult, Verdict, MAX_SCORE};
use crate::error::AnalysisError;
use crate::features::AcousticFeatures;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Full result of one successful analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationReport {
    /// Caller-supplied label (e.g. "live recording", a file name).
    pub source: String,
    /// Duration of the decoded 16 kHz signal.
    pub duration_seconds: f64,
    pub features: AcousticFeatures,
    /// Number of triggered rules, 0..=`max_score`.
    pub score: u8,
    pub max_score: u8,
    /// One entry per triggered rule, in evaluation order.
    pub reasons: Vec<String>,
    pub verdict: Verdict,
    /// One-line headline for the verdict.
    pub summary: String,
    /// Why the verdict was reached, quoting the measured features.
    pub explanation: String,
}

impl ClassificationReport {
    pub fn new(
        source: impl Into<String>,
        duration_seconds: f64,
        features: AcousticFeatures,
        result: ClassificationResult,
    ) -> Self {
        let ClassificationResult {
            score,
            reasons,
            verdict,
        } = result;

        let (summary, explanation) = match verdict {
            Verdict::Synthetic => (
                format!(
                    "High risk: likely an AI-synthesized voice (AI score: {score}/{MAX_SCORE})"
                ),
                format!(
                    "Timbre richness is low ({:.1}) and frequency variation is too slow ({:.4}), \
                     consistent with digital synthesis.",
                    features.timbre_variance, features.zcr
                ),
            ),
            Verdict::Human => (
                format!("Likely a real human voice (AI score: {score}/{MAX_SCORE})"),
                "The signal shows natural dynamic range, a rich harmonic fingerprint and \
                 natural frequency variation."
                    .to_string(),
            ),
        };

        Self {
            source: source.into(),
            duration_seconds,
            features,
            score,
            max_score: MAX_SCORE,
            reasons,
            verdict,
            summary,
            explanation,
        }
    }

    /// Dashboard-style metric rows: `(label, formatted value)`.
    pub fn metric_rows(&self) -> [(&'static str, String); 3] {
        [
            ("RMS (energy)", format!("{:.5}", self.features.rms)),
            ("ZCR (frequency variation)", format!("{:.5}", self.features.zcr)),
            (
                "MFCC var (timbre richness)",
                format!("{:.1}", self.features.timbre_variance),
            ),
        ]
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Machine-readable failure category with its structured details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ErrorKind {
    Decode { cause: String },
    ClipTooShort { min_seconds: f64, actual_seconds: f64 },
}

impl From<&AnalysisError> for ErrorKind {
    fn from(err: &AnalysisError) -> Self {
        match err {
            AnalysisError::Decode { cause } => ErrorKind::Decode {
                cause: cause.clone(),
            },
            AnalysisError::ClipTooShort {
                min_seconds,
                actual_seconds,
            } => ErrorKind::ClipTooShort {
                min_seconds: *min_seconds,
                actual_seconds: *actual_seconds,
            },
        }
    }
}

/// Tagged success/failure value for hosts that never want a `Result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AnalysisOutcome {
    Ok {
        report: ClassificationReport,
    },
    Error {
        source: String,
        kind: ErrorKind,
        /// Technical message (`Display` of the error).
        message: String,
        /// What the user should do next.
        guidance: String,
    },
}

impl AnalysisOutcome {
    pub fn new(
        source: impl Into<String>,
        result: Result<ClassificationReport, AnalysisError>,
    ) -> Self {
        match result {
            Ok(report) => AnalysisOutcome::Ok { report },
            Err(err) => AnalysisOutcome::Error {
                source: source.into(),
                kind: ErrorKind::from(&err),
                message: err.to_string(),
                guidance: guidance_for(&err),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, AnalysisOutcome::Ok { .. })
    }

    pub fn report(&self) -> Option<&ClassificationReport> {
        match self {
            AnalysisOutcome::Ok { report } => Some(report),
            AnalysisOutcome::Error { .. } => None,
        }
    }
}

fn guidance_for(err: &AnalysisError) -> String {
    match err {
        AnalysisError::Decode { .. } => {
            "The audio could not be read. Please try again with a wav, mp3 or m4a recording."
                .to_string()
        }
        AnalysisError::ClipTooShort { min_seconds, .. } => format!(
            "The recording is too short to analyse. Speak for at least {min_seconds:.1} s \
             (3-5 s recommended) and try again."
        ),
    }
}
