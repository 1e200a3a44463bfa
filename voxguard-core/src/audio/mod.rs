//! Raw clip intake: container sniffing, decoding and rate normalisation.
//!
//! # Design constraints
//!
//! Callers hand over opaque bytes from an upload widget or a microphone
//! recorder. This module turns them into a `DecodedSignal`: mono f32 at the
//! pipeline's fixed rate. Nothing here inspects the content beyond what the
//! decoders need, and nothing outlives the call.
//!
//! WAV goes through `hound`. mp3 and m4a go through `symphonia`, which is
//! gated behind the default `compressed` feature.

#[cfg(feature = "compressed")]
pub mod compressed;
pub mod resample;
pub mod wav;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AnalysisError, Result};
use resample::RateConverter;

/// Rubato input block size used for whole-clip conversion.
const RESAMPLE_CHUNK: usize = 1024;

/// Container format of a raw clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    Wav,
    Mp3,
    M4a,
    /// Neither declared nor recognised from magic bytes.
    Unknown,
}

impl ContainerFormat {
    /// Recognise a format from its leading bytes.
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            return Self::Wav;
        }
        if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
            return Self::M4a;
        }
        if bytes.starts_with(b"ID3") {
            return Self::Mp3;
        }
        // MPEG audio frame sync: 11 set bits.
        if bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0 {
            return Self::Mp3;
        }
        Self::Unknown
    }

    /// Parse a declared format: a bare extension, a file name or a MIME type.
    ///
    /// Returns `Unknown` for anything unrecognised.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_ascii_lowercase();
        let tail = label
            .rsplit(|c: char| c == '.' || c == '/')
            .next()
            .unwrap_or(label.as_str());
        match tail {
            "wav" | "wave" | "x-wav" => Self::Wav,
            "mp3" | "mpeg" | "mpeg3" | "x-mpeg" => Self::Mp3,
            "m4a" | "mp4" | "aac" | "x-m4a" => Self::M4a,
            _ => Self::Unknown,
        }
    }

    /// File extension used as a probe hint.
    pub fn extension(self) -> Option<&'static str> {
        match self {
            Self::Wav => Some("wav"),
            Self::Mp3 => Some("mp3"),
            Self::M4a => Some("m4a"),
            Self::Unknown => None,
        }
    }
}

/// Immutable clip bytes plus their container format.
///
/// Owned by a single pipeline invocation and dropped once decoded.
#[derive(Debug, Clone)]
pub struct RawAudioClip {
    bytes: Vec<u8>,
    format: ContainerFormat,
}

impl RawAudioClip {
    /// Wrap bytes, sniffing the container from magic bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let format = ContainerFormat::sniff(&bytes);
        Self { bytes, format }
    }

    /// Wrap bytes with a declared format (extension, file name or MIME type).
    ///
    /// A recognised declaration wins over sniffing; an unrecognised one falls
    /// back to the sniffed format.
    pub fn with_declared_format(bytes: impl Into<Vec<u8>>, declared: &str) -> Self {
        let mut clip = Self::new(bytes);
        let declared = ContainerFormat::from_label(declared);
        if declared != ContainerFormat::Unknown {
            clip.format = declared;
        }
        clip
    }

    pub fn format(&self) -> ContainerFormat {
        self.format
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Mono f32 samples at the pipeline's fixed rate.
#[derive(Debug, Clone)]
pub struct DecodedSignal {
    /// Mono f32 samples, nominally in [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Always the pipeline target rate (Hz).
    pub sample_rate: u32,
}

impl DecodedSignal {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Returns the duration of this signal in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Decode a clip and normalise it to `target_rate` mono.
///
/// # Errors
/// `AnalysisError::Decode` for corrupt data, unsupported containers, empty
/// streams or resampler failures.
pub fn decode(clip: RawAudioClip, target_rate: u32) -> Result<DecodedSignal> {
    if clip.is_empty() {
        return Err(AnalysisError::decode("empty input"));
    }

    let format = clip.format();
    let (samples, source_rate) = match format {
        ContainerFormat::Wav => wav::decode(clip.bytes())?,
        other => decode_compressed(clip.bytes(), other)?,
    };
    drop(clip);

    if samples.is_empty() {
        return Err(AnalysisError::decode("stream contains no audio samples"));
    }
    if source_rate == 0 {
        return Err(AnalysisError::decode("stream declares a 0 Hz sample rate"));
    }

    debug!(
        ?format,
        source_rate,
        source_samples = samples.len(),
        "clip decoded"
    );

    let samples = resample(&samples, source_rate, target_rate)?;
    Ok(DecodedSignal::new(samples, target_rate))
}

/// Convert mono samples from `source_rate` to `target_rate` in one pass.
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    RateConverter::new(source_rate, target_rate, RESAMPLE_CHUNK)?.convert_all(samples)
}

#[cfg(feature = "compressed")]
fn decode_compressed(bytes: &[u8], format: ContainerFormat) -> Result<(Vec<f32>, u32)> {
    compressed::decode(bytes, format)
}

#[cfg(not(feature = "compressed"))]
fn decode_compressed(_bytes: &[u8], format: ContainerFormat) -> Result<(Vec<f32>, u32)> {
    Err(AnalysisError::decode(format!(
        "{format:?} input requires the `compressed` feature"
    )))
}

/// Reject NaN or infinite samples, which float containers can carry.
pub(crate) fn ensure_finite(samples: &[f32]) -> Result<()> {
    match samples.iter().position(|s| !s.is_finite()) {
        Some(index) => {
            debug!(index, "non-finite sample in decoded stream");
            Err(AnalysisError::decode("non-finite sample"))
        }
        None => Ok(()),
    }
}

/// Average interleaved frames down to one channel.
pub(crate) fn downmix(interleaved: Vec<f32>, channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved;
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}
