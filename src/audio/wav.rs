//! WAV encoding and decoding for engine payloads and CLI input.

use crate::audio::buffer::{AudioBuffer, AudioSegment};
use crate::error::{FacetalkError, Result};
use std::io::{Cursor, Read};

/// Decodes WAV data into a mono float32 buffer.
///
/// Integer and float formats of any bit depth are accepted; multi-channel
/// audio is averaged down to mono.
pub fn decode_wav(bytes: &[u8]) -> Result<AudioBuffer> {
    decode_reader(Cursor::new(bytes))
}

fn decode_reader<R: Read>(reader: R) -> Result<AudioBuffer> {
    let mut wav_reader = hound::WavReader::new(reader).map_err(|e| FacetalkError::InvalidAudio {
        message: format!("Failed to parse WAV data: {}", e),
    })?;

    let spec = wav_reader.spec();
    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => wav_reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>(),
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            wav_reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<_>, _>>()
        }
    }
    .map_err(|e| FacetalkError::InvalidAudio {
        message: format!("Failed to read WAV samples: {}", e),
    })?;

    let samples = downmix(&interleaved, spec.channels);
    AudioBuffer::new(samples, spec.sample_rate)
}

/// Averages interleaved channels into one.
fn downmix(interleaved: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels as usize)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Encodes a speech segment as 16-bit mono WAV.
pub fn encode_segment(segment: &AudioSegment) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: segment.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| FacetalkError::InvalidAudio {
                message: format!("Failed to create WAV writer: {}", e),
            })?;
        for &sample in &segment.samples {
            writer
                .write_sample(sample)
                .map_err(|e| FacetalkError::InvalidAudio {
                    message: format!("Failed to write WAV sample: {}", e),
                })?;
        }
        writer.finalize().map_err(|e| FacetalkError::InvalidAudio {
            message: format!("Failed to finalize WAV data: {}", e),
        })?;
    }
    Ok(cursor.into_inner())
}

/// Reads a WAV file as a recognition segment (16-bit mono).
pub fn read_segment(path: &std::path::Path) -> Result<AudioSegment> {
    let file = std::fs::File::open(path)?;
    let buffer = decode_reader(std::io::BufReader::new(file))?;
    let sample_rate = buffer.sample_rate();
    Ok(AudioSegment::new(
        crate::audio::buffer::f32_to_i16(buffer.samples()),
        sample_rate,
    ))
}
