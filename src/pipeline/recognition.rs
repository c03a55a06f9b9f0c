//! Recognition stage: captured speech segments to transcripts.

use crate::audio::buffer::AudioSegment;
use crate::pipeline::error::StageError;
use crate::pipeline::queue::Stage;
use crate::pipeline::types::Transcript;
use crate::stt::recognizer::SpeechRecognizer;
use std::sync::Arc;

pub struct RecognitionStage {
    recognizer: Arc<dyn SpeechRecognizer>,
    language: String,
    energy_threshold: f32,
}

impl RecognitionStage {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>, language: &str) -> Self {
        Self {
            recognizer,
            language: language.to_string(),
            energy_threshold: 0.0,
        }
    }

    /// Segments whose RMS falls below `threshold` are treated as silence.
    pub fn with_energy_threshold(mut self, threshold: f32) -> Self {
        self.energy_threshold = threshold;
        self
    }
}

impl Stage for RecognitionStage {
    type Request = AudioSegment;
    type Response = Transcript;

    fn name(&self) -> &'static str {
        "recognition"
    }

    fn process(&mut self, segment: AudioSegment) -> Result<Option<Transcript>, StageError> {
        let rms = segment.rms();
        if rms < self.energy_threshold {
            tracing::debug!(
                rms,
                threshold = self.energy_threshold,
                duration_ms = segment.duration_ms(),
                "segment below energy threshold, skipping"
            );
            return Ok(None);
        }

        let text = self
            .recognizer
            .recognize(&segment, &self.language)
            .map_err(StageError::from)?;
        let text = text.trim();
        if text.is_empty() {
            tracing::warn!(
                engine = self.recognizer.name(),
                "could not understand audio, skipping"
            );
            return Ok(None);
        }

        tracing::debug!(text, "recognized");
        Ok(Some(Transcript {
            text: text.to_string(),
        }))
    }
}
