//! RIFF/WAVE decoding via `hound`.

use std::io::Cursor;

use crate::error::{AnalysisError, Result};

use super::{downmix, ensure_finite};

/// Decode an in-memory WAV file to mono f32 samples at its native rate.
///
/// Integer PCM is scaled to [-1.0, 1.0]; multi-channel frames are averaged.
pub fn decode(bytes: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes)).map_err(AnalysisError::decode)?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(AnalysisError::decode)?,
        hound::SampleFormat::Int => {
            if spec.bits_per_sample <= 16 {
                let max = ((1_i32 << (spec.bits_per_sample.max(1) - 1)) - 1).max(1) as f32;
                reader
                    .samples::<i16>()
                    .map(|s| s.map(|v| v as f32 / max))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(AnalysisError::decode)?
            } else {
                let max = ((1_i64 << (spec.bits_per_sample - 1)) - 1) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / max))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(AnalysisError::decode)?
            }
        }
    };

    ensure_finite(&interleaved)?;
    Ok((downmix(interleaved, channels), spec.sample_rate))
}
