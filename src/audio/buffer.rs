//! Sample buffers flowing through the pipeline.

use crate::error::{FacetalkError, Result};

/// Mono float32 samples at a fixed, non-zero sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Creates a buffer.
    ///
    /// # Errors
    /// Returns `FacetalkError::InvalidAudio` if `sample_rate` is zero.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(FacetalkError::InvalidAudio {
                message: "sample rate must be greater than zero".to_string(),
            });
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        self.samples.len() as u64 * 1000 / self.sample_rate as u64
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

/// A captured speech segment handed to the recognizer, as 16-bit PCM.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl AudioSegment {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Root mean square on the 16-bit sample scale.
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum_squares: f64 = self
            .samples
            .iter()
            .map(|&s| {
                let v = s as f64;
                v * v
            })
            .sum();
        (sum_squares / self.samples.len() as f64).sqrt() as f32
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / self.sample_rate as u64
    }
}

/// Encodes samples as little-endian float32 bytes.
pub fn f32_to_le_bytes(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 4);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Decodes little-endian float32 bytes.
///
/// # Errors
/// Returns `FacetalkError::InvalidAudio` if the length is not a multiple of 4.
pub fn f32_from_le_bytes(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(FacetalkError::InvalidAudio {
            message: format!(
                "float32 payload length {} is not a multiple of 4",
                bytes.len()
            ),
        });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Converts 16-bit PCM to float32 in [-1.0, 1.0).
pub fn i16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}

/// Converts float32 to 16-bit PCM, clamping out-of-range values.
pub fn f32_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_rejects_zero_sample_rate() {
        assert!(matches!(
            AudioBuffer::new(vec![0.0], 0),
            Err(FacetalkError::InvalidAudio { .. })
        ));
    }

    #[test]
    fn test_buffer_accessors() {
        let buffer = AudioBuffer::new(vec![0.0; 8000], 16000).unwrap();
        assert_eq!(buffer.len(), 8000);
        assert_eq!(buffer.sample_rate(), 16000);
        assert_eq!(buffer.duration_ms(), 500);
        assert!(!buffer.is_empty());
    }

    #[test]
    fn test_le_bytes_decode_known_values() {
        let samples = [0.0f32, 0.5, -0.5, 1.0];
        let bytes = f32_to_le_bytes(&samples);
        assert_eq!(bytes.len(), 16);
        // 0.5f32 == 0x3F000000, little-endian
        assert_eq!(&bytes[4..8], &[0x00, 0x00, 0x00, 0x3F]);
        assert_eq!(f32_from_le_bytes(&bytes).unwrap(), samples.to_vec());
    }

    #[test]
    fn test_le_bytes_rejects_partial_sample() {
        assert!(f32_from_le_bytes(&[0, 0, 0]).is_err());
        assert_eq!(f32_from_le_bytes(&[]).unwrap(), Vec::<f32>::new());
    }

    #[test]
    fn test_segment_rms() {
        let silent = AudioSegment::new(vec![0; 100], 16000);
        assert_eq!(silent.rms(), 0.0);

        let loud = AudioSegment::new(vec![1000, -1000, 1000, -1000], 16000);
        assert!((loud.rms() - 1000.0).abs() < 0.01);

        let empty = AudioSegment::new(vec![], 16000);
        assert_eq!(empty.rms(), 0.0);
    }

    #[test]
    fn test_pcm_conversions() {
        assert_eq!(i16_to_f32(&[0, -32768, 16384]), vec![0.0, -1.0, 0.5]);
        assert_eq!(f32_to_i16(&[0.0, 2.0, -2.0]), vec![0, i16::MAX, -i16::MAX]);
    }
}
