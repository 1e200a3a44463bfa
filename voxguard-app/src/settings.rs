//! Persistent host settings (JSON file in the user data directory).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::warn;
use voxguard_core::{AnalyzerConfig, ThresholdPreset, ThresholdProfile};

/// Environment variable that overrides the preset stored in the settings file.
pub const PRESET_ENV: &str = "VOXGUARD_PRESET";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub preset: String,
    /// Per-threshold overrides applied on top of the preset.
    pub zcr_low: Option<f32>,
    pub timbre_floor: Option<f32>,
    pub zcr_extreme: Option<f32>,
    pub extreme_timbre_ceiling: Option<f32>,
    pub min_duration_secs: f64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            preset: ThresholdPreset::default().as_str().into(),
            zcr_low: None,
            timbre_floor: None,
            zcr_extreme: None,
            extreme_timbre_ceiling: None,
            min_duration_secs: AnalyzerConfig::default().min_duration_secs,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.preset = normalize_preset(&self.preset);
        for value in [
            &mut self.zcr_low,
            &mut self.timbre_floor,
            &mut self.zcr_extreme,
            &mut self.extreme_timbre_ceiling,
        ] {
            *value = value.filter(|v| v.is_finite());
        }
        if !(self.min_duration_secs.is_finite() && self.min_duration_secs > 0.0) {
            self.min_duration_secs = AnalyzerConfig::default().min_duration_secs;
        }
    }

    /// Apply `VOXGUARD_PRESET` when it names a known preset.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(raw) = std::env::var(PRESET_ENV) {
            self.apply_preset_override(&raw);
        }
    }

    fn apply_preset_override(&mut self, raw: &str) {
        match ThresholdPreset::from_name(raw) {
            Some(preset) => self.preset = preset.as_str().into(),
            None => warn!(value = raw, "ignoring unknown {PRESET_ENV}"),
        }
    }

    pub fn preset(&self) -> ThresholdPreset {
        ThresholdPreset::from_name(&self.preset).unwrap_or_default()
    }

    pub fn thresholds(&self) -> ThresholdProfile {
        let mut profile = self.preset().profile();
        if let Some(v) = self.zcr_low {
            profile = profile.with_zcr_low(v);
        }
        if let Some(v) = self.timbre_floor {
            profile = profile.with_timbre_floor(v);
        }
        if let Some(v) = self.zcr_extreme {
            profile = profile.with_zcr_extreme(v);
        }
        if let Some(v) = self.extreme_timbre_ceiling {
            profile = profile.with_extreme_timbre_ceiling(Some(v));
        }
        profile
    }

    pub fn analyzer_config(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            min_duration_secs: self.min_duration_secs,
            ..AnalyzerConfig::default()
        }
        .with_thresholds(self.thresholds())
    }
}

pub fn normalize_preset(raw: &str) -> String {
    ThresholdPreset::from_name(raw)
        .unwrap_or_default()
        .as_str()
        .into()
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Voxguard")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("voxguard")
            .join("settings.json")
    }
}

/// Missing or unreadable files yield defaults; a file that exists but does not
/// parse is an error so a typo never silently resets the thresholds.
pub fn load_settings(path: &Path) -> anyhow::Result<AppSettings> {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str::<AppSettings>(&raw)
            .with_context(|| format!("invalid settings file {}", path.display()))?,
        Err(_) => AppSettings::default(),
    };
    settings.normalize();
    Ok(settings)
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}

/// Store `preset` (when given) in the settings file, keeping its other values.
/// `VOXGUARD_PRESET` is not applied.
pub fn persist_preset(
    path: &Path,
    preset: Option<ThresholdPreset>,
) -> anyhow::Result<AppSettings> {
    let mut settings = load_settings(path)?;
    if let Some(preset) = preset {
        settings.preset = preset.as_str().into();
    }
    save_settings(path, &settings).with_context(|| format!("writing {}", path.display()))?;
    Ok(settings)
}
