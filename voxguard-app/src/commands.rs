//! Per-file analysis and report rendering for the CLI host.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use tracing::warn;
use voxguard_core::{AnalysisError, AnalysisOutcome, Analyzer, RawAudioClip};

/// Read one file and analyse it on the blocking pool.
///
/// An unreadable file is reported as a decode failure for that file only.
pub async fn analyze_file(analyzer: Arc<Analyzer>, path: &Path) -> AnalysisOutcome {
    let label = path.display().to_string();
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(file = %label, "cannot read audio file: {e}");
            let err = AnalysisError::Decode {
                cause: format!("cannot read file: {e}"),
            };
            return AnalysisOutcome::new(label, Err(err));
        }
    };

    let declared = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    let clip = RawAudioClip::with_declared_format(bytes, declared);
    let result = analyzer.analyze_clip_async(clip, label.clone()).await;
    AnalysisOutcome::new(label, result)
}

/// Human-readable block for one outcome.
pub fn render_outcome(outcome: &AnalysisOutcome) -> String {
    let mut out = String::new();
    match outcome {
        AnalysisOutcome::Ok { report } => {
            let _ = writeln!(out, "== {} ({:.2} s) ==", report.source, report.duration_seconds);
            let _ = writeln!(out, "{}", report.summary);
            for (label, value) in report.metric_rows() {
                let _ = writeln!(out, "  {label:<28}{value:>12}");
            }
            if !report.reasons.is_empty() {
                let _ = writeln!(out, "  Triggered:");
                for reason in &report.reasons {
                    let _ = writeln!(out, "    - {reason}");
                }
            }
            let _ = writeln!(out, "{}", report.explanation);
        }
        AnalysisOutcome::Error {
            source,
            message,
            guidance,
            ..
        } => {
            let _ = writeln!(out, "== {source} ==");
            let _ = writeln!(out, "Error: {message}");
            let _ = writeln!(out, "{guidance}");
        }
    }
    out
}
