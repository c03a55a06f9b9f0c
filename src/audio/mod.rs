//! Audio buffers, chunking and WAV handling.

pub mod buffer;
pub mod chunker;
pub mod wav;

pub use buffer::{AudioBuffer, AudioSegment};
pub use chunker::{AudioChunk, AudioChunker};
