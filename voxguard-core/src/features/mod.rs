//! Acoustic descriptors: short-time energy, zero-crossing rate and timbre
//! variance.
//!
//! All three share one framing: `frame_length`-sample frames every
//! `hop_length` samples, centred on the signal (padded by half a frame at
//! both ends), giving `1 + n / hop_length` frames. RMS and the cepstral
//! front end pad with zeros; ZCR repeats the edge sample so the padding adds
//! no crossings.

pub mod spectral;

use serde::{Deserialize, Serialize};

use crate::audio::DecodedSignal;
use spectral::MfccFrontend;

/// Magnitudes at or below this count as exact zero when detecting sign changes.
const ZERO_CROSSING_THRESHOLD: f32 = 1e-10;

/// Scalar descriptors of one clip. Recomputed per clip, never merged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcousticFeatures {
    /// Mean short-time RMS energy. Always ≥ 0.
    pub rms: f32,
    /// Mean fraction of sign changes per frame, in [0, 1].
    pub zcr: f32,
    /// Population variance of all cepstral coefficients across all frames. ≥ 0.
    pub timbre_variance: f32,
}

/// Computes `AcousticFeatures` from a decoded signal.
///
/// Construction precomputes the FFT plan and filterbanks; `extract` only
/// reads them, so one extractor serves any number of threads.
pub struct FeatureExtractor {
    frame_length: usize,
    hop_length: usize,
    frontend: MfccFrontend,
}

impl FeatureExtractor {
    pub fn new(
        sample_rate: u32,
        frame_length: usize,
        hop_length: usize,
        n_mels: usize,
        n_mfcc: usize,
    ) -> Self {
        Self {
            frame_length,
            hop_length,
            frontend: MfccFrontend::new(sample_rate, frame_length, hop_length, n_mels, n_mfcc),
        }
    }

    pub fn extract(&self, signal: &DecodedSignal) -> AcousticFeatures {
        let samples = &signal.samples;
        let rms = self.mean_rms(samples);
        let zcr = self.mean_zcr(samples);
        let timbre_variance = population_variance(self.frontend.mfcc(samples).iter().copied());

        AcousticFeatures {
            rms: rms as f32,
            zcr: zcr as f32,
            timbre_variance: timbre_variance as f32,
        }
    }

    /// Mean over frames of `sqrt(mean(x²))`.
    pub fn mean_rms(&self, samples: &[f32]) -> f64 {
        let padded = pad_centered(samples, self.frame_length / 2, Padding::Zero);
        mean(self.frames(&padded).map(|frame| {
            let sum_sq: f64 = frame.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
            (sum_sq / frame.len() as f64).sqrt()
        }))
    }

    /// Mean over frames of `crossings / frame_length`.
    pub fn mean_zcr(&self, samples: &[f32]) -> f64 {
        let padded = pad_centered(samples, self.frame_length / 2, Padding::Edge);
        mean(self.frames(&padded).map(|frame| {
            let crossings = frame
                .windows(2)
                .filter(|pair| is_negative(pair[0]) != is_negative(pair[1]))
                .count();
            crossings as f64 / frame.len() as f64
        }))
    }

    fn frames<'a>(&self, padded: &'a [f32]) -> impl Iterator<Item = &'a [f32]> + 'a {
        let frame_length = self.frame_length;
        let hop = self.hop_length;
        let n_frames = if padded.len() >= frame_length {
            1 + (padded.len() - frame_length) / hop
        } else {
            0
        };
        (0..n_frames).map(move |i| &padded[i * hop..i * hop + frame_length])
    }
}

fn is_negative(sample: f32) -> bool {
    sample < -ZERO_CROSSING_THRESHOLD
}

#[derive(Clone, Copy)]
enum Padding {
    Zero,
    Edge,
}

fn pad_centered(samples: &[f32], pad: usize, mode: Padding) -> Vec<f32> {
    let (head, tail) = match mode {
        Padding::Zero => (0.0, 0.0),
        Padding::Edge => (
            samples.first().copied().unwrap_or(0.0),
            samples.last().copied().unwrap_or(0.0),
        ),
    };
    let mut padded = Vec::with_capacity(samples.len() + 2 * pad);
    padded.resize(pad, head);
    padded.extend_from_slice(samples);
    padded.resize(samples.len() + 2 * pad, tail);
    padded
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn population_variance(values: impl Iterator<Item = f32> + Clone) -> f64 {
    let m = mean(values.clone().map(f64::from));
    mean(values.map(|v| {
        let d = f64::from(v) - m;
        d * d
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(16_000, 2048, 512, 128, 13)
    }

    fn sine(freq: f32, amplitude: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / 16_000.0).sin())
            .collect()
    }

    #[test]
    fn constant_signal_rms_inside_and_tapering_at_edges() {
        let ex = extractor();
        // Long enough that edge frames barely move the mean.
        let rms = ex.mean_rms(&vec![0.5f32; 160_000]);
        assert!(rms > 0.49 && rms <= 0.5 + 1e-9, "rms={rms}");
    }

    #[test]
    fn silence_has_zero_energy_and_no_crossings() {
        let ex = extractor();
        let silent = vec![0.0f32; 16_000];
        assert_eq!(ex.mean_rms(&silent), 0.0);
        assert_eq!(ex.mean_zcr(&silent), 0.0);
    }

    #[test]
    fn alternating_signal_crosses_every_sample() {
        let ex = extractor();
        let samples: Vec<f32> = (0..16_000)
            .map(|i| if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect();
        let zcr = ex.mean_zcr(&samples);
        // Edge padding adds flat runs only in the outermost frames.
        assert!(zcr > 0.9 && zcr <= 1.0, "zcr={zcr}");
    }

    #[test]
    fn sine_zcr_tracks_twice_its_frequency() {
        let ex = extractor();
        let zcr = ex.mean_zcr(&sine(480.0, 0.5, 32_000));
        // 2 * 480 / 16000 = 0.06, minus the edge-padded frames.
        assert!((zcr - 0.06).abs() < 0.006, "zcr={zcr}");
    }

    #[test]
    fn tiny_jitter_around_zero_is_not_a_crossing() {
        let ex = extractor();
        let samples: Vec<f32> = (0..8_000)
            .map(|i| if i % 2 == 0 { 1e-12 } else { -1e-12 })
            .collect();
        assert_eq!(ex.mean_zcr(&samples), 0.0);
    }

    #[test]
    fn features_respect_their_ranges() {
        let ex = extractor();
        let mut samples = sine(220.0, 0.3, 12_000);
        for (i, s) in samples.iter_mut().enumerate() {
            *s += 0.05 * ((i * 7919 % 113) as f32 / 56.0 - 1.0);
        }
        let features = ex.extract(&DecodedSignal::new(samples, 16_000));
        assert!(features.rms >= 0.0);
        assert!((0.0..=1.0).contains(&features.zcr));
        assert!(features.timbre_variance >= 0.0);
    }

    #[test]
    fn extraction_is_deterministic() {
        let ex = extractor();
        let signal = DecodedSignal::new(sine(330.0, 0.4, 9_000), 16_000);
        assert_eq!(ex.extract(&signal), ex.extract(&signal));
    }

    #[test]
    fn variance_of_known_values() {
        let v = population_variance([1.0f32, 2.0, 3.0, 4.0].into_iter());
        assert_relative_eq!(v, 1.25, epsilon = 1e-12);
        assert_eq!(population_variance(std::iter::empty::<f32>()), 0.0);
    }

    #[test]
    fn padding_modes() {
        assert_eq!(
            pad_centered(&[1.0, 2.0], 2, Padding::Zero),
            vec![0.0, 0.0, 1.0, 2.0, 0.0, 0.0]
        );
        assert_eq!(
            pad_centered(&[1.0, 2.0], 2, Padding::Edge),
            vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]
        );
    }
}
