//! Mel-frequency cepstral front end.
//!
//! ## Algorithm
//!
//! Per centred, zero-padded frame:
//!
//! 1. Periodic Hann window, `n_fft`-point FFT, power spectrum (`n_fft / 2 + 1` bins).
//! 2. Slaney mel filterbank (0 Hz – Nyquist, area-normalised) → `n_mels` energies.
//!
//! Over the whole clip:
//!
//! 3. Power-to-dB with a `1e-10` floor, clamped to `max − 80 dB`.
//! 4. Orthonormal DCT-II along the mel axis, keeping the first `n_mfcc` rows.
//!
//! The window, filterbank, DCT basis and FFT plan are built once and only
//! read afterwards, so a `MfccFrontend` can be shared across threads.

use std::sync::Arc;

use ndarray::Array2;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

const AMIN: f32 = 1e-10;
const TOP_DB: f32 = 80.0;

pub struct MfccFrontend {
    n_fft: usize,
    hop: usize,
    hann_window: Vec<f32>,
    /// `[n_mels, n_fft / 2 + 1]`
    mel_filters: Array2<f32>,
    /// `[n_mfcc, n_mels]`
    dct_basis: Array2<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl MfccFrontend {
    pub fn new(sample_rate: u32, n_fft: usize, hop: usize, n_mels: usize, n_mfcc: usize) -> Self {
        let fft = FftPlanner::<f32>::new().plan_fft_forward(n_fft);
        let nyquist = sample_rate as f32 / 2.0;
        Self {
            n_fft,
            hop,
            hann_window: build_hann_window(n_fft),
            mel_filters: build_mel_filters(n_fft, sample_rate, n_mels, 0.0, nyquist),
            dct_basis: build_dct_basis(n_mfcc, n_mels),
            fft,
        }
    }

    /// Mel power spectrogram, `[n_mels, n_frames]`.
    pub fn mel_spectrogram(&self, samples: &[f32]) -> Array2<f32> {
        let pad = self.n_fft / 2;
        let mut padded = vec![0.0f32; samples.len() + 2 * pad];
        padded[pad..pad + samples.len()].copy_from_slice(samples);

        let n_frames = 1 + (padded.len() - self.n_fft) / self.hop;
        let n_freqs = self.n_fft / 2 + 1;
        let n_mels = self.mel_filters.nrows();

        let mut mel = Array2::<f32>::zeros((n_mels, n_frames));
        let mut fft_buf = vec![Complex::new(0.0f32, 0.0); self.n_fft];
        let mut scratch = vec![Complex::new(0.0f32, 0.0); self.fft.get_inplace_scratch_len()];
        let mut power = vec![0.0f32; n_freqs];

        for frame in 0..n_frames {
            let start = frame * self.hop;
            let window = &padded[start..start + self.n_fft];

            for ((slot, &s), &w) in fft_buf.iter_mut().zip(window).zip(&self.hann_window) {
                *slot = Complex::new(s * w, 0.0);
            }
            self.fft.process_with_scratch(&mut fft_buf, &mut scratch);

            for (p, bin) in power.iter_mut().zip(&fft_buf[..n_freqs]) {
                *p = bin.norm_sqr();
            }

            for (m, filter) in self.mel_filters.rows().into_iter().enumerate() {
                let energy: f32 = filter.iter().zip(&power).map(|(w, p)| w * p).sum();
                mel[[m, frame]] = energy;
            }
        }

        mel
    }

    /// Cepstral coefficients, `[n_mfcc, n_frames]`.
    pub fn mfcc(&self, samples: &[f32]) -> Array2<f32> {
        let mut db = self.mel_spectrogram(samples);
        power_to_db_in_place(&mut db);
        self.dct_basis.dot(&db)
    }
}

/// `10·log10(max(AMIN, p))` relative to a unit reference, clamped to
/// `TOP_DB` below the loudest cell.
fn power_to_db_in_place(spec: &mut Array2<f32>) {
    spec.mapv_inplace(|v| 10.0 * v.max(AMIN).log10());
    let max_val = spec.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    spec.mapv_inplace(|v| v.max(max_val - TOP_DB));
}

fn build_hann_window(n: usize) -> Vec<f32> {
    use std::f32::consts::PI;
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / n as f32).cos()))
        .collect()
}

fn build_mel_filters(fft_size: usize, sr: u32, n_mels: usize, fmin: f32, fmax: f32) -> Array2<f32> {
    let n_freqs = fft_size / 2 + 1;
    let mel_min = hz_to_mel_slaney(fmin);
    let mel_max = hz_to_mel_slaney(fmax);

    let hz_pts: Vec<f32> = (0..=(n_mels + 1))
        .map(|i| mel_min + (mel_max - mel_min) * i as f32 / (n_mels + 1) as f32)
        .map(mel_to_hz_slaney)
        .collect();
    let fft_freqs: Vec<f32> = (0..n_freqs)
        .map(|k| k as f32 * sr as f32 / fft_size as f32)
        .collect();

    let mut filters = Array2::<f32>::zeros((n_mels, n_freqs));
    for m in 0..n_mels {
        let lower = hz_pts[m];
        let center = hz_pts[m + 1];
        let upper = hz_pts[m + 2];
        let down_denom = (center - lower).max(1e-10);
        let up_denom = (upper - center).max(1e-10);
        let enorm = 2.0 / (upper - lower).max(1e-10);

        for (k, &freq) in fft_freqs.iter().enumerate() {
            let rising = (freq - lower) / down_denom;
            let falling = (upper - freq) / up_denom;
            filters[[m, k]] = rising.min(falling).max(0.0) * enorm;
        }
    }
    filters
}

/// Orthonormal DCT-II basis, first `n_mfcc` rows.
fn build_dct_basis(n_mfcc: usize, n_mels: usize) -> Array2<f32> {
    use std::f64::consts::PI;
    let n = n_mels as f64;
    Array2::from_shape_fn((n_mfcc, n_mels), |(k, m)| {
        let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
        (scale * (PI * k as f64 * (2.0 * m as f64 + 1.0) / (2.0 * n)).cos()) as f32
    })
}

// Slaney mel scale: linear below 1 kHz, logarithmic above.
const F_SP: f32 = 200.0 / 3.0;
const MIN_LOG_HZ: f32 = 1_000.0;
const MIN_LOG_MEL: f32 = MIN_LOG_HZ / F_SP;

fn log_step() -> f32 {
    6.4f32.ln() / 27.0
}

fn hz_to_mel_slaney(hz: f32) -> f32 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

fn mel_to_hz_slaney(mel: f32) -> f32 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        mel * F_SP
    }
}
