//! Slices synthesized audio into fixed-size chunks for streamed delivery.

use crate::audio::buffer::AudioBuffer;
use crate::error::{FacetalkError, Result};
use std::time::Duration;

/// A contiguous slice of an [`AudioBuffer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioChunk<'a> {
    pub samples: &'a [f32],
    pub sample_rate: u32,
    /// Position of this chunk within its buffer.
    pub index: usize,
}

/// Splits buffers into chunks of `sample_rate / chunks_per_second` samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioChunker {
    chunks_per_second: u32,
    delay: Duration,
}

impl AudioChunker {
    /// Creates a chunker.
    ///
    /// `chunks_per_second` of 10 yields 100 ms chunks; `delay` is the pacing
    /// pause inserted between two chunk sends.
    ///
    /// # Errors
    /// Returns `FacetalkError::ConfigInvalidValue` if `chunks_per_second` is zero.
    pub fn new(chunks_per_second: u32, delay: Duration) -> Result<Self> {
        if chunks_per_second == 0 {
            return Err(FacetalkError::ConfigInvalidValue {
                key: "delivery.chunks_per_second".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(Self {
            chunks_per_second,
            delay,
        })
    }

    pub fn chunks_per_second(&self) -> u32 {
        self.chunks_per_second
    }

    /// Pacing delay between two chunk sends.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Chunk size in samples for a sample rate, never less than 1.
    pub fn chunk_size(&self, sample_rate: u32) -> usize {
        (sample_rate / self.chunks_per_second).max(1) as usize
    }

    /// Slices a buffer in order. Every chunk but the last has `chunk_size` samples.
    pub fn split<'a>(&self, buffer: &'a AudioBuffer) -> Vec<AudioChunk<'a>> {
        let size = self.chunk_size(buffer.sample_rate());
        buffer
            .samples()
            .chunks(size)
            .enumerate()
            .map(|(index, samples)| AudioChunk {
                samples,
                sample_rate: buffer.sample_rate(),
                index,
            })
            .collect()
    }

    /// Number of chunks `split` produces for `len` samples at `sample_rate`.
    pub fn chunk_count(&self, len: usize, sample_rate: u32) -> usize {
        len.div_ceil(self.chunk_size(sample_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(len: usize, rate: u32) -> AudioBuffer {
        AudioBuffer::new((0..len).map(|i| i as f32).collect(), rate).unwrap()
    }

    #[test]
    fn test_chunk_size_from_rate() {
        let chunker = AudioChunker::new(10, Duration::ZERO).unwrap();
        assert_eq!(chunker.chunk_size(16000), 1600);
        assert_eq!(chunker.chunk_size(22050), 2205);
    }

    #[test]
    fn test_chunk_size_clamps_to_one() {
        let chunker = AudioChunker::new(48000, Duration::ZERO).unwrap();
        assert_eq!(chunker.chunk_size(16000), 1);
    }

    #[test]
    fn test_zero_chunks_per_second_is_rejected() {
        assert!(AudioChunker::new(0, Duration::ZERO).is_err());
    }

    #[test]
    fn test_exact_multiple_has_no_short_tail() {
        // 16000 / 4000 = 4 samples per chunk
        let chunker = AudioChunker::new(4000, Duration::ZERO).unwrap();
        let buf = buffer(8, 16000);
        let chunks = chunker.split(&buf);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].samples, &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(chunks[1].samples, &[4.0, 5.0, 6.0, 7.0]);
        assert_eq!(chunks[1].index, 1);
        assert_eq!(chunks[1].sample_rate, 16000);
    }

    #[test]
    fn test_lengths_sum_to_buffer_and_only_last_is_short() {
        let chunker = AudioChunker::new(10, Duration::ZERO).unwrap();
        for len in [0usize, 1, 1599, 1600, 1601, 4800, 5000, 16001] {
            let buf = buffer(len, 16000);
            let chunks = chunker.split(&buf);
            let total: usize = chunks.iter().map(|c| c.samples.len()).sum();
            assert_eq!(total, len, "length {len}");
            assert_eq!(chunks.len(), chunker.chunk_count(len, 16000), "length {len}");
            if let Some((last, rest)) = chunks.split_last() {
                assert!(rest.iter().all(|c| c.samples.len() == 1600));
                let expected_last = if len % 1600 == 0 { 1600 } else { len % 1600 };
                assert_eq!(last.samples.len(), expected_last);
            }
        }
    }

    #[test]
    fn test_chunks_preserve_order() {
        let chunker = AudioChunker::new(1000, Duration::ZERO).unwrap();
        let buf = buffer(55, 16000);
        let flattened: Vec<f32> = chunker
            .split(&buf)
            .iter()
            .flat_map(|c| c.samples.iter().copied())
            .collect();
        assert_eq!(flattened, buf.samples());
    }

    #[test]
    fn test_empty_buffer_has_no_chunks() {
        let chunker = AudioChunker::new(10, Duration::from_millis(40)).unwrap();
        assert!(chunker.split(&buffer(0, 16000)).is_empty());
        assert_eq!(chunker.delay(), Duration::from_millis(40));
    }
}
