//! Voxguard command-line host.
//!
//! ```text
//! voxguard [--settings <file>] [--preset <name>] [--save] [--json] <audio-file>...
//! ```
//!
//! `--save` writes the chosen preset back to the settings file; with no audio
//! files it only saves.
//!
//! Exit status: 0 when every file was analysed, 2 when any file produced an
//! analysis error, 1 on usage or settings errors.

mod commands;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use settings::{default_settings_path, load_settings, persist_preset};
use tracing::info;
use voxguard_core::{AnalysisOutcome, Analyzer, ThresholdPreset};

const USAGE: &str = "Usage: voxguard [--settings <file>] [--preset field|compound|lenient] \
                     [--save] [--json] <audio-file>...";

#[derive(Debug, Default)]
struct CliArgs {
    settings_path: Option<PathBuf>,
    preset: Option<ThresholdPreset>,
    json: bool,
    save: bool,
    files: Vec<PathBuf>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Option<CliArgs>> {
    let mut cli = CliArgs::default();
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--settings" => {
                let v = it.next().context("missing value for --settings")?;
                cli.settings_path = Some(PathBuf::from(v));
            }
            "--preset" => {
                let v = it.next().context("missing value for --preset")?;
                let preset = ThresholdPreset::from_name(&v)
                    .with_context(|| format!("unknown preset: {v}"))?;
                cli.preset = Some(preset);
            }
            "--json" => cli.json = true,
            "--save" => cli.save = true,
            "--help" | "-h" => return Ok(None),
            flag if flag.starts_with("--") => bail!("unknown argument: {flag}"),
            file => cli.files.push(PathBuf::from(file)),
        }
    }
    if cli.files.is_empty() && !cli.save {
        bail!("no audio files given");
    }
    Ok(Some(cli))
}

fn main() -> ExitCode {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("voxguard=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("voxguard: {e:#}");
            eprintln!("{USAGE}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let Some(cli) = parse_args(std::env::args().skip(1))? else {
        println!("{USAGE}");
        return Ok(ExitCode::SUCCESS);
    };

    let settings_path = cli.settings_path.unwrap_or_else(default_settings_path);
    if cli.save {
        let saved = persist_preset(&settings_path, cli.preset)?;
        info!(settings = %settings_path.display(), preset = %saved.preset, "settings saved");
        if cli.files.is_empty() {
            return Ok(ExitCode::SUCCESS);
        }
    }
    let mut app_settings = load_settings(&settings_path)?;
    app_settings.apply_env_overrides();
    if let Some(preset) = cli.preset {
        app_settings.preset = preset.as_str().into();
    }
    info!(
        settings = %settings_path.display(),
        preset = %app_settings.preset,
        files = cli.files.len(),
        "Voxguard starting"
    );

    let analyzer = Arc::new(
        Analyzer::new(app_settings.analyzer_config()).context("invalid analyzer settings")?,
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    let outcomes = runtime.block_on(analyze_all(analyzer, cli.files));

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
    } else {
        for outcome in &outcomes {
            println!("{}", commands::render_outcome(outcome));
        }
    }

    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    info!(analysed = outcomes.len() - failed, failed, "Voxguard finished");
    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

/// Analyse every file concurrently; outcomes keep the argument order.
async fn analyze_all(analyzer: Arc<Analyzer>, files: Vec<PathBuf>) -> Vec<AnalysisOutcome> {
    let handles: Vec<_> = files
        .into_iter()
        .map(|path| {
            let analyzer = Arc::clone(&analyzer);
            tokio::spawn(async move { commands::analyze_file(analyzer, &path).await })
        })
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => tracing::error!("analysis task cancelled: {e}"),
        }
    }
    outcomes
}
