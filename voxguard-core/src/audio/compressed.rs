//! Compressed-container decoding (mp3, m4a/AAC) via `symphonia`.
//!
//! Only the first decodable track is read. Packets that fail to decode are
//! skipped with a warning, matching how browsers tolerate a damaged frame in
//! an otherwise playable recording; a clip where *every* packet fails is a
//! decode error.

use std::io::Cursor;

use symphonia::core::{
    audio::SampleBuffer,
    codecs::{DecoderOptions, CODEC_TYPE_NULL},
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::{MediaSourceStream, MediaSourceStreamOptions},
    meta::MetadataOptions,
    probe::Hint,
};
use tracing::{debug, warn};

use crate::error::{AnalysisError, Result};

use super::{downmix, ensure_finite, ContainerFormat};

/// Decode an in-memory compressed clip to mono f32 samples at its native rate.
pub fn decode(bytes: &[u8], format: ContainerFormat) -> Result<(Vec<f32>, u32)> {
    let source = Cursor::new(bytes.to_vec());
    let stream = MediaSourceStream::new(Box::new(source), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    if let Some(ext) = format.extension() {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(AnalysisError::decode)?;
    let mut reader = probed.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AnalysisError::decode("no decodable audio track"))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(AnalysisError::decode)?;

    let mut mono = Vec::new();
    let mut decoded_packets = 0usize;
    let mut skipped_packets = 0usize;

    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(AnalysisError::decode(e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(buffer) => {
                let spec = *buffer.spec();
                sample_rate.get_or_insert(spec.rate);
                let channels = spec.channels.count().max(1);
                let mut interleaved = SampleBuffer::<f32>::new(buffer.capacity() as u64, spec);
                interleaved.copy_interleaved_ref(buffer);
                ensure_finite(interleaved.samples())?;
                mono.extend(downmix(interleaved.samples().to_vec(), channels));
                decoded_packets += 1;
            }
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("skipping corrupt packet: {e}");
                skipped_packets += 1;
            }
            Err(e) => return Err(AnalysisError::decode(e)),
        }
    }

    if decoded_packets == 0 {
        return Err(AnalysisError::decode(format!(
            "no packets could be decoded ({skipped_packets} skipped)"
        )));
    }

    let sample_rate =
        sample_rate.ok_or_else(|| AnalysisError::decode("stream does not declare a sample rate"))?;

    debug!(
        ?format,
        decoded_packets,
        skipped_packets,
        samples = mono.len(),
        sample_rate,
        "compressed clip decoded"
    );

    Ok((mono, sample_rate))
}
