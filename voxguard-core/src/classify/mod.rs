//! Threshold-rule risk classifier.
//!
//! ## Algorithm
//!
//! Three rules, evaluated in order against the *same* features. Each rule
//! that holds adds one point and appends its reason:
//!
//! 1. `zcr < zcr_low`
//! 2. `timbre_variance < timbre_floor`
//! 3. `zcr < zcr_extreme`, and `timbre_variance < extreme_timbre_ceiling`
//!    when a ceiling is configured
//!
//! `score >= 2` → `Verdict::Synthetic`, otherwise `Verdict::Human`.
//!
//! Threshold values are field-recalibrated defaults, not fitted parameters;
//! `ThresholdPreset` names the known variants and `ThresholdProfile` accepts
//! arbitrary overrides.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::features::AcousticFeatures;

/// Upper bound of `ClassificationResult::score`.
pub const MAX_SCORE: u8 = 3;

/// Score at or above which a clip is reported as synthetic.
pub const SYNTHETIC_SCORE: u8 = 2;

pub const REASON_LOW_ZCR: &str = "frequency variability below natural-speech floor";
pub const REASON_FLAT_TIMBRE: &str = "timbre fingerprint too uniform for natural harmonics";
pub const REASON_EXTREME: &str = "extreme digital-synthesis signature";

/// Binary outcome of a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Synthetic,
    Human,
}

impl Verdict {
    pub fn from_score(score: u8) -> Self {
        if score >= SYNTHETIC_SCORE {
            Verdict::Synthetic
        } else {
            Verdict::Human
        }
    }

    pub fn is_synthetic(self) -> bool {
        self == Verdict::Synthetic
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Synthetic => write!(f, "SYNTHETIC"),
            Verdict::Human => write!(f, "HUMAN"),
        }
    }
}

/// Score, triggered reasons (in rule order) and verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub score: u8,
    pub reasons: Vec<String>,
    pub verdict: Verdict,
}

/// Classifier thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct ThresholdProfile {
    /// Rule 1: ZCR below this is under the natural-speech floor.
    pub zcr_low: f32,
    /// Rule 2: timbre variance below this is too uniform.
    pub timbre_floor: f32,
    /// Rule 3: ZCR below this is an extreme synthesis signature.
    pub zcr_extreme: f32,
    /// Rule 3 additionally requires timbre variance below this, when set.
    pub extreme_timbre_ceiling: Option<f32>,
}

impl Default for ThresholdProfile {
    fn default() -> Self {
        ThresholdPreset::default().profile()
    }
}

impl ThresholdProfile {
    pub fn with_zcr_low(mut self, value: f32) -> Self {
        self.zcr_low = value;
        self
    }

    pub fn with_timbre_floor(mut self, value: f32) -> Self {
        self.timbre_floor = value;
        self
    }

    pub fn with_zcr_extreme(mut self, value: f32) -> Self {
        self.zcr_extreme = value;
        self
    }

    pub fn with_extreme_timbre_ceiling(mut self, value: Option<f32>) -> Self {
        self.extreme_timbre_ceiling = value;
        self
    }

    /// Reject NaN and infinite thresholds; they would silently disable a rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("zcr_low", Some(self.zcr_low)),
            ("timbre_floor", Some(self.timbre_floor)),
            ("zcr_extreme", Some(self.zcr_extreme)),
            ("extreme_timbre_ceiling", self.extreme_timbre_ceiling),
        ];
        for (name, value) in checks {
            if let Some(value) = value.filter(|v| !v.is_finite()) {
                return Err(ConfigError::NonFiniteThreshold { name, value });
            }
        }
        Ok(())
    }
}

/// Named threshold variants observed during field recalibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdPreset {
    /// ZCR 0.115 / timbre 10400 / extreme ZCR 0.095.
    #[default]
    Field,
    /// ZCR 0.100 / timbre 10400 / extreme ZCR 0.100 gated by timbre < 10000.
    Compound,
    /// ZCR 0.085 / timbre 10000 / extreme ZCR 0.095.
    Lenient,
}

impl ThresholdPreset {
    pub const ALL: [ThresholdPreset; 3] = [
        ThresholdPreset::Field,
        ThresholdPreset::Compound,
        ThresholdPreset::Lenient,
    ];

    pub fn profile(self) -> ThresholdProfile {
        match self {
            ThresholdPreset::Field => ThresholdProfile {
                zcr_low: 0.115,
                timbre_floor: 10_400.0,
                zcr_extreme: 0.095,
                extreme_timbre_ceiling: None,
            },
            ThresholdPreset::Compound => ThresholdProfile {
                zcr_low: 0.100,
                timbre_floor: 10_400.0,
                zcr_extreme: 0.100,
                extreme_timbre_ceiling: Some(10_000.0),
            },
            ThresholdPreset::Lenient => ThresholdProfile {
                zcr_low: 0.085,
                timbre_floor: 10_000.0,
                zcr_extreme: 0.095,
                extreme_timbre_ceiling: None,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ThresholdPreset::Field => "field",
            ThresholdPreset::Compound => "compound",
            ThresholdPreset::Lenient => "lenient",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|preset| preset.as_str().eq_ignore_ascii_case(name))
    }
}

/// Stateless rule evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskClassifier {
    profile: ThresholdProfile,
}

impl RiskClassifier {
    pub fn new(profile: ThresholdProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &ThresholdProfile {
        &self.profile
    }

    pub fn classify(&self, features: &AcousticFeatures) -> ClassificationResult {
        let p = &self.profile;
        let rules = [
            (features.zcr < p.zcr_low, REASON_LOW_ZCR),
            (features.timbre_variance < p.timbre_floor, REASON_FLAT_TIMBRE),
            (
                features.zcr < p.zcr_extreme
                    && p
                        .extreme_timbre_ceiling
                        .map_or(true, |ceiling| features.timbre_variance < ceiling),
                REASON_EXTREME,
            ),
        ];

        let reasons: Vec<String> = rules
            .into_iter()
            .filter(|(triggered, _)| *triggered)
            .map(|(_, reason)| reason.to_string())
            .collect();
        let score = reasons.len() as u8;

        ClassificationResult {
            score,
            verdict: Verdict::from_score(score),
            reasons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(zcr: f32, timbre_variance: f32) -> AcousticFeatures {
        AcousticFeatures {
            rms: 0.05,
            zcr,
            timbre_variance,
        }
    }

    #[test]
    fn flat_synthetic_clip_triggers_every_rule() {
        let result = RiskClassifier::default().classify(&features(0.06, 8_000.0));
        assert_eq!(result.score, 3);
        assert_eq!(result.verdict, Verdict::Synthetic);
        assert_eq!(
            result.reasons,
            vec![REASON_LOW_ZCR, REASON_FLAT_TIMBRE, REASON_EXTREME]
        );
    }

    #[test]
    fn natural_speech_triggers_nothing() {
        let result = RiskClassifier::default().classify(&features(0.14, 12_000.0));
        assert_eq!(result.score, 0);
        assert_eq!(result.verdict, Verdict::Human);
        assert!(result.reasons.is_empty());
    }

    #[test]
    fn verdict_flips_at_two_points() {
        let classifier = RiskClassifier::default();
        // score 0
        let r0 = classifier.classify(&features(0.20, 20_000.0));
        // score 1: timbre only
        let r1 = classifier.classify(&features(0.20, 9_000.0));
        // score 2: low zcr + timbre
        let r2 = classifier.classify(&features(0.10, 9_000.0));
        // score 3
        let r3 = classifier.classify(&features(0.05, 9_000.0));

        for (result, score) in [(&r0, 0), (&r1, 1), (&r2, 2), (&r3, 3)] {
            assert_eq!(result.score, score);
            assert_eq!(result.verdict.is_synthetic(), score >= 2);
        }
        assert_eq!(r1.reasons, vec![REASON_FLAT_TIMBRE]);
    }

    #[test]
    fn reasons_follow_rule_order() {
        // Rules 1 and 3 without rule 2.
        let result = RiskClassifier::default().classify(&features(0.05, 15_000.0));
        assert_eq!(result.reasons, vec![REASON_LOW_ZCR, REASON_EXTREME]);
        assert_eq!(result.score, 2);
    }

    #[test]
    fn superset_of_rules_never_scores_lower() {
        let classifier = RiskClassifier::default();
        let grid_zcr = [0.01, 0.09, 0.1, 0.12, 0.3];
        let grid_var = [1_000.0, 10_399.0, 10_401.0, 50_000.0];
        let results: Vec<_> = grid_zcr
            .iter()
            .flat_map(|&z| grid_var.iter().map(move |&v| features(z, v)))
            .map(|f| classifier.classify(&f))
            .collect();
        for a in &results {
            for b in &results {
                let superset = b.reasons.iter().all(|r| a.reasons.contains(r));
                if superset {
                    assert!(a.score >= b.score);
                }
            }
        }
    }

    #[test]
    fn thresholds_are_strict() {
        let profile = ThresholdProfile::default();
        let result = RiskClassifier::new(profile).classify(&features(0.115, 10_400.0));
        assert_eq!(result.score, 0);
    }

    #[test]
    fn compound_rule_needs_timbre_ceiling() {
        let classifier = RiskClassifier::new(ThresholdPreset::Compound.profile());
        // Low zcr but timbre above the ceiling: rules 1 and 2 only.
        let result = classifier.classify(&features(0.09, 10_200.0));
        assert_eq!(result.reasons, vec![REASON_LOW_ZCR, REASON_FLAT_TIMBRE]);

        let result = classifier.classify(&features(0.09, 9_000.0));
        assert_eq!(result.score, 3);
    }

    #[test]
    fn overrides_replace_single_thresholds() {
        let profile = ThresholdProfile::default().with_zcr_low(0.2).with_timbre_floor(0.0);
        let result = RiskClassifier::new(profile).classify(&features(0.15, 5_000.0));
        assert_eq!(result.reasons, vec![REASON_LOW_ZCR]);
        assert_eq!(result.verdict, Verdict::Human);
    }

    #[test]
    fn non_finite_thresholds_are_rejected() {
        let profile = ThresholdProfile::default().with_extreme_timbre_ceiling(Some(f32::NAN));
        assert!(matches!(
            profile.validate(),
            Err(ConfigError::NonFiniteThreshold {
                name: "extreme_timbre_ceiling",
                ..
            })
        ));
        assert!(ThresholdProfile::default().validate().is_ok());
    }

    #[test]
    fn presets_resolve_by_name() {
        assert_eq!(ThresholdPreset::from_name("Compound"), Some(ThresholdPreset::Compound));
        assert_eq!(ThresholdPreset::from_name(" field "), Some(ThresholdPreset::Field));
        assert_eq!(ThresholdPreset::from_name("strict"), None);
        assert_eq!(ThresholdProfile::default(), ThresholdPreset::Field.profile());
    }

    #[test]
    fn profile_deserialises_partial_overrides() {
        let profile: ThresholdProfile =
            serde_json::from_str(r#"{ "zcrLow": 0.1, "extremeTimbreCeiling": 9800 }"#).unwrap();
        assert_eq!(profile.zcr_low, 0.1);
        assert_eq!(profile.timbre_floor, 10_400.0);
        assert_eq!(profile.extreme_timbre_ceiling, Some(9_800.0));
    }
}
