//! Batch evaluation of a threshold preset against a labelled fixture tree.
//!
//! ```text
//! fixtures/
//!   synthetic/…/*.wav|mp3|m4a   expected verdict SYNTHETIC ("ai" also accepted)
//!   human/…/*.wav|mp3|m4a       expected verdict HUMAN ("real" also accepted)
//!   other/…                     reported, not scored
//! ```
//!
//! Measures a profile; it never adjusts one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use voxguard_core::{
    AnalysisOutcome, Analyzer, AnalyzerConfig, ErrorKind, RawAudioClip, ThresholdPreset, Verdict,
};

const AUDIO_EXTENSIONS: [&str; 3] = ["wav", "mp3", "m4a"];

#[derive(Debug)]
struct Args {
    fixtures_dir: PathBuf,
    preset: ThresholdPreset,
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct CaseResult {
    file: String,
    category: String,
    expected: Option<Verdict>,
    verdict: Option<Verdict>,
    score: Option<u8>,
    rms: Option<f32>,
    zcr: Option<f32>,
    timbre_variance: Option<f32>,
    error: Option<ErrorKind>,
    latency_ms: f64,
}

impl CaseResult {
    fn is_correct(&self) -> Option<bool> {
        Some(self.expected? == self.verdict?)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct CategorySummary {
    category: String,
    runs: usize,
    errors: usize,
    synthetic_rate: f64,
    accuracy: Option<f64>,
    mean_zcr: Option<f32>,
    mean_timbre_variance: Option<f32>,
    p50_latency_ms: f64,
    p95_latency_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary {
    fixtures_dir: String,
    preset: ThresholdPreset,
    total_files: usize,
    accuracy: Option<f64>,
    p50_latency_ms: f64,
    p95_latency_ms: f64,
    categories: Vec<CategorySummary>,
    cases: Vec<CaseResult>,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("evaluation failed: {e:#}");
        std::process::exit(1);
    }
}

fn parse_args() -> Result<Args> {
    let mut fixtures_dir: Option<PathBuf> = None;
    let mut preset = ThresholdPreset::default();
    let mut output: Option<PathBuf> = None;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--fixtures" => {
                let v = it.next().context("missing value for --fixtures")?;
                fixtures_dir = Some(PathBuf::from(v));
            }
            "--preset" => {
                let v = it.next().context("missing value for --preset")?;
                preset = ThresholdPreset::from_name(&v)
                    .with_context(|| format!("unknown preset: {v}"))?;
            }
            "--output" => {
                let v = it.next().context("missing value for --output")?;
                output = Some(PathBuf::from(v));
            }
            "--help" | "-h" => {
                println!(
                    "Usage: cargo run -p voxguard-core --bin evaluate -- \\
  --fixtures <dir> [--preset field|compound|lenient] [--output <file.json>]"
                );
                std::process::exit(0);
            }
            other => bail!("unknown argument: {other}"),
        }
    }

    Ok(Args {
        fixtures_dir: fixtures_dir.unwrap_or_else(|| PathBuf::from("fixtures")),
        preset,
        output,
    })
}

fn collect_audio(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect_audio(&path, out)?;
            continue;
        }
        let is_audio = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| AUDIO_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(ext)))
            .unwrap_or(false);
        if is_audio {
            out.push(path);
        }
    }
    Ok(())
}

fn expected_for(relative: &Path) -> (String, Option<Verdict>) {
    for component in relative.components() {
        let name = component.as_os_str().to_string_lossy().to_ascii_lowercase();
        match name.as_str() {
            "synthetic" | "ai" => return ("synthetic".into(), Some(Verdict::Synthetic)),
            "human" | "real" => return ("human".into(), Some(Verdict::Human)),
            _ => {}
        }
    }
    ("other".into(), None)
}

fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let idx = ((sorted.len() - 1) as f64 * p.clamp(0.0, 1.0)).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    (denominator > 0).then(|| numerator as f64 / denominator as f64)
}

fn mean_f32(values: impl Iterator<Item = f32>) -> Option<f32> {
    let (sum, n) = values.fold((0.0f64, 0usize), |(s, n), v| (s + f64::from(v), n + 1));
    (n > 0).then(|| (sum / n as f64) as f32)
}

fn accuracy(rows: &[CaseResult]) -> Option<f64> {
    let scored: Vec<bool> = rows.iter().filter_map(CaseResult::is_correct).collect();
    ratio(scored.iter().filter(|ok| **ok).count(), scored.len())
}

fn summarize(category: String, rows: &[CaseResult]) -> CategorySummary {
    let latencies: Vec<f64> = rows.iter().map(|r| r.latency_ms).collect();
    let analysed = rows.iter().filter(|r| r.verdict.is_some()).count();
    let synthetic = rows
        .iter()
        .filter(|r| r.verdict == Some(Verdict::Synthetic))
        .count();

    CategorySummary {
        category,
        runs: rows.len(),
        errors: rows.iter().filter(|r| r.error.is_some()).count(),
        synthetic_rate: ratio(synthetic, analysed).unwrap_or(0.0),
        accuracy: accuracy(rows),
        mean_zcr: mean_f32(rows.iter().filter_map(|r| r.zcr)),
        mean_timbre_variance: mean_f32(rows.iter().filter_map(|r| r.timbre_variance)),
        p50_latency_ms: percentile(&latencies, 0.50),
        p95_latency_ms: percentile(&latencies, 0.95),
    }
}

fn run() -> Result<()> {
    let args = parse_args()?;
    if !args.fixtures_dir.exists() {
        bail!("fixtures directory not found: {}", args.fixtures_dir.display());
    }

    let mut files = Vec::new();
    collect_audio(&args.fixtures_dir, &mut files)?;
    files.sort();
    if files.is_empty() {
        bail!("no audio fixtures found in {}", args.fixtures_dir.display());
    }

    println!(
        "Evaluating preset '{}' on {} fixtures",
        args.preset.as_str(),
        files.len()
    );

    let analyzer =
        Analyzer::new(AnalyzerConfig::default().with_thresholds(args.preset.profile()))?;

    let mut cases = Vec::with_capacity(files.len());
    for path in &files {
        let relative = path.strip_prefix(&args.fixtures_dir).unwrap_or(path);
        let file = relative.display().to_string();
        let (category, expected) = expected_for(relative);
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let declared = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        let started = Instant::now();
        let clip = RawAudioClip::with_declared_format(bytes, &declared);
        let result = analyzer.analyze_clip(clip, &file);
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let case = match AnalysisOutcome::new(file.clone(), result) {
            AnalysisOutcome::Ok { report } => CaseResult {
                file: file.clone(),
                category,
                expected,
                verdict: Some(report.verdict),
                score: Some(report.score),
                rms: Some(report.features.rms),
                zcr: Some(report.features.zcr),
                timbre_variance: Some(report.features.timbre_variance),
                error: None,
                latency_ms,
            },
            AnalysisOutcome::Error { kind, .. } => CaseResult {
                file: file.clone(),
                category,
                expected,
                verdict: None,
                score: None,
                rms: None,
                zcr: None,
                timbre_variance: None,
                error: Some(kind),
                latency_ms,
            },
        };

        match (&case.verdict, &case.error) {
            (Some(verdict), _) => println!("{file} → {verdict} ({latency_ms:.1} ms)"),
            (None, Some(kind)) => println!("{file} → error {kind:?}"),
            (None, None) => {}
        }
        cases.push(case);
    }

    let mut grouped: BTreeMap<String, Vec<CaseResult>> = BTreeMap::new();
    for row in &cases {
        grouped
            .entry(row.category.clone())
            .or_default()
            .push(row.clone());
    }
    let categories: Vec<CategorySummary> = grouped
        .into_iter()
        .map(|(name, rows)| summarize(name, &rows))
        .collect();

    let all_latencies: Vec<f64> = cases.iter().map(|r| r.latency_ms).collect();
    let summary = Summary {
        fixtures_dir: args.fixtures_dir.display().to_string(),
        preset: args.preset,
        total_files: files.len(),
        accuracy: accuracy(&cases),
        p50_latency_ms: percentile(&all_latencies, 0.50),
        p95_latency_ms: percentile(&all_latencies, 0.95),
        categories,
        cases,
    };

    match summary.accuracy {
        Some(acc) => println!(
            "Done. files={} accuracy={:.1}% p50={:.1}ms p95={:.1}ms",
            summary.total_files,
            acc * 100.0,
            summary.p50_latency_ms,
            summary.p95_latency_ms
        ),
        None => println!(
            "Done. files={} (no labelled fixtures) p50={:.1}ms p95={:.1}ms",
            summary.total_files, summary.p50_latency_ms, summary.p95_latency_ms
        ),
    }

    let json = serde_json::to_string_pretty(&summary)?;
    if let Some(out) = args.output {
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&out, json).with_context(|| format!("writing {}", out.display()))?;
        println!("Wrote evaluation report: {}", out.display());
    } else {
        println!("{json}");
    }

    Ok(())
}
