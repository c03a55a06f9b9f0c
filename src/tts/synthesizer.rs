use crate::audio::buffer::AudioBuffer;
use crate::error::{FacetalkError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Trait for text-to-speech backends.
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize one utterance into mono float32 audio.
    fn synthesize(&self, text: &str, language: &str) -> Result<AudioBuffer>;

    /// Engine name for logs.
    fn name(&self) -> &str;
}

impl<T: SpeechSynthesizer> SpeechSynthesizer for Arc<T> {
    fn synthesize(&self, text: &str, language: &str) -> Result<AudioBuffer> {
        (**self).synthesize(text, language)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Mock synthesizer for testing
///
/// Produces `samples_per_char` samples per input character, so buffer
/// lengths identify which utterance they came from.
#[derive(Debug, Clone)]
pub struct MockSynthesizer {
    sample_rate: u32,
    samples_per_char: usize,
    fail_on_call: Option<usize>,
    calls: Arc<AtomicUsize>,
    texts: Arc<Mutex<Vec<String>>>,
}

impl Default for MockSynthesizer {
    fn default() -> Self {
        Self::new(16000)
    }
}

impl MockSynthesizer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            samples_per_char: 4,
            fail_on_call: None,
            calls: Arc::new(AtomicUsize::new(0)),
            texts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_samples_per_char(mut self, samples: usize) -> Self {
        self.samples_per_char = samples;
        self
    }

    /// Fail the `n`th call (1-based).
    pub fn failing_on_call(mut self, n: usize) -> Self {
        self.fail_on_call = Some(n);
        self
    }

    /// Texts synthesized so far, including failed attempts.
    pub fn texts(&self) -> Vec<String> {
        self.texts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SpeechSynthesizer for MockSynthesizer {
    fn synthesize(&self, text: &str, _language: &str) -> Result<AudioBuffer> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.texts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(text.to_string());

        if self.fail_on_call == Some(call) {
            return Err(FacetalkError::Synthesis {
                message: format!("mock synthesis failure on call {}", call),
            });
        }

        let len = text.chars().count() * self.samples_per_char;
        let samples = (0..len).map(|i| ((i % 200) as f32 / 100.0) - 1.0).collect();
        AudioBuffer::new(samples, self.sample_rate)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_length_follows_text() {
        let synth = MockSynthesizer::new(22050).with_samples_per_char(10);
        let buffer = synth.synthesize("abc", "en").unwrap();
        assert_eq!(buffer.len(), 30);
        assert_eq!(buffer.sample_rate(), 22050);
    }

    #[test]
    fn test_mock_fails_on_requested_call() {
        let synth = MockSynthesizer::default().failing_on_call(2);
        assert!(synth.synthesize("one", "en").is_ok());
        assert!(matches!(
            synth.synthesize("two", "en"),
            Err(FacetalkError::Synthesis { .. })
        ));
        assert!(synth.synthesize("three", "en").is_ok());
        assert_eq!(synth.texts(), vec!["one", "two", "three"]);
        assert_eq!(synth.calls(), 3);
    }
}
