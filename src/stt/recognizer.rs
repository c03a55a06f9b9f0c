use crate::audio::buffer::AudioSegment;
use crate::error::{FacetalkError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Trait for speech-to-text recognition.
///
/// This trait allows swapping implementations (web services vs mock).
pub trait SpeechRecognizer: Send + Sync {
    /// Recognize speech in a captured segment.
    ///
    /// # Arguments
    /// * `segment` - 16-bit PCM mono audio
    /// * `language` - BCP-47 language tag, e.g. `en-US`
    ///
    /// # Returns
    /// The transcript, or an empty string if nothing intelligible was heard
    fn recognize(&self, segment: &AudioSegment, language: &str) -> Result<String>;

    /// Engine name for logs.
    fn name(&self) -> &str;
}

impl<T: SpeechRecognizer> SpeechRecognizer for Arc<T> {
    fn recognize(&self, segment: &AudioSegment, language: &str) -> Result<String> {
        (**self).recognize(segment, language)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Mock recognizer for testing
#[derive(Debug, Clone)]
pub struct MockRecognizer {
    response: String,
    should_fail: bool,
    calls: Arc<AtomicUsize>,
}

impl Default for MockRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRecognizer {
    pub fn new() -> Self {
        Self {
            response: "mock transcript".to_string(),
            should_fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Configure the mock to return a specific transcript
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Configure the mock to fail on recognize
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Number of recognize calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SpeechRecognizer for MockRecognizer {
    fn recognize(&self, _segment: &AudioSegment, _language: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            Err(FacetalkError::Recognition {
                message: "mock recognition failure".to_string(),
            })
        } else {
            Ok(self.response.clone())
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
