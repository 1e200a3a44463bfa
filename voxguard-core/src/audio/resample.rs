//! Whole-clip sample-rate conversion using a rubato `FastFixedIn` resampler.
//!
//! ## Design
//!
//! Uploads and browser recordings arrive at whatever rate the device used
//! (commonly 44.1 or 48 kHz). Feature thresholds are calibrated at 16 kHz
//! mono f32. `RateConverter` bridges that gap once per clip.
//!
//! When source rate == target rate, `RateConverter` is a passthrough and no
//! rubato session is created.
//!
//! ## Usage
//!
//! ```ignore
//! let mut rc = RateConverter::new(48_000, 16_000, 1024)?;
//! let out = rc.convert_all(&decoded)?; // Vec<f32> at 16 kHz
//! ```

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;

use crate::error::{AnalysisError, Result};

/// Converts f32 mono audio from one fixed sample rate to another.
pub struct RateConverter {
    /// `None` when source rate == target rate (passthrough mode).
    resampler: Option<FastFixedIn<f32>>,
    /// How many input samples rubato expects per process call.
    chunk_size: usize,
    /// Pre-allocated output buffer: `[1][output_frames_max]`.
    output_buf: Vec<Vec<f32>>,
    ratio: f64,
}

impl RateConverter {
    /// Create a new converter.
    ///
    /// # Parameters
    /// - `source_rate`: Sample rate of the decoded audio (Hz).
    /// - `target_rate`: Sample rate the features are computed at (Hz).
    /// - `chunk_size`: Input frame count per rubato call (e.g. `1024`).
    ///
    /// # Errors
    /// Returns `AnalysisError::Decode` if rubato rejects the rate pair.
    pub fn new(source_rate: u32, target_rate: u32, chunk_size: usize) -> Result<Self> {
        let ratio = target_rate as f64 / source_rate.max(1) as f64;

        if source_rate == target_rate {
            return Ok(Self {
                resampler: None,
                chunk_size,
                output_buf: Vec::new(),
                ratio,
            });
        }

        let resampler = FastFixedIn::<f32>::new(
            ratio,
            1.0, // fixed ratio
            PolynomialDegree::Cubic,
            chunk_size,
            1, // mono
        )
        .map_err(|e| AnalysisError::decode(format!("resampler init: {e}")))?;

        let max_out = resampler.output_frames_max();
        let output_buf = vec![vec![0f32; max_out]; 1];

        debug!(source_rate, target_rate, chunk_size, "resampling enabled");

        Ok(Self {
            resampler: Some(resampler),
            chunk_size,
            output_buf,
            ratio,
        })
    }

    /// Convert an entire clip in one call.
    ///
    /// Full `chunk_size` blocks go through `process_into_buffer`; the tail is
    /// flushed with `process_partial_into_buffer`. The resampler's output
    /// delay is trimmed so the result holds `ceil(len * ratio)` samples.
    pub fn convert_all(&mut self, samples: &[f32]) -> Result<Vec<f32>> {
        let Some(ref mut resampler) = self.resampler else {
            return Ok(samples.to_vec());
        };

        let expected = (samples.len() as f64 * self.ratio).ceil() as usize;
        let delay = resampler.output_delay();
        let mut result = Vec::with_capacity(expected + delay + self.output_buf[0].len());

        let mut blocks = samples.chunks_exact(self.chunk_size);
        for block in blocks.by_ref() {
            let (_consumed, produced) = resampler
                .process_into_buffer(&[block], &mut self.output_buf, None)
                .map_err(|e| AnalysisError::decode(format!("resampler process: {e}")))?;
            result.extend_from_slice(&self.output_buf[0][..produced]);
        }

        let tail = blocks.remainder();
        if !tail.is_empty() {
            let (_consumed, produced) = resampler
                .process_partial_into_buffer(Some(&[tail][..]), &mut self.output_buf, None)
                .map_err(|e| AnalysisError::decode(format!("resampler flush: {e}")))?;
            result.extend_from_slice(&self.output_buf[0][..produced]);
        }

        // Drain the delay line until the expected tail is out.
        let mut guard = 0;
        while result.len() < expected + delay && guard < 4 {
            let (_consumed, produced) = resampler
                .process_partial_into_buffer(None::<&[&[f32]]>, &mut self.output_buf, None)
                .map_err(|e| AnalysisError::decode(format!("resampler flush: {e}")))?;
            result.extend_from_slice(&self.output_buf[0][..produced]);
            guard += 1;
        }

        result.drain(..delay.min(result.len()));
        result.truncate(expected);
        Ok(result)
    }

    /// Returns `true` when source rate == target rate (no resampling occurs).
    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }
}
