//! Synthesis stage: reply text to delivered audio.
//!
//! A reply is split into utterances that are synthesized and delivered one
//! after another, each in its own delivery session, so spoken order always
//! matches text order. The first failure abandons the rest of the reply.

use crate::delivery::client::AudioStreamClient;
use crate::pipeline::error::StageError;
use crate::pipeline::queue::Stage;
use crate::pipeline::types::SpokenResponse;
use crate::text::splitter::SentenceSplitter;
use crate::tts::synthesizer::SpeechSynthesizer;
use std::sync::{Arc, RwLock};

/// Where the stage is within the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SynthesisState {
    #[default]
    Idle,
    Splitting,
    Synthesizing { index: usize, total: usize },
    Delivering { index: usize, total: usize },
}

pub struct SynthesisStage {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    splitter: SentenceSplitter,
    client: AudioStreamClient,
    language: String,
    state: Arc<RwLock<SynthesisState>>,
}

impl SynthesisStage {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        splitter: SentenceSplitter,
        client: AudioStreamClient,
        language: &str,
    ) -> Self {
        Self {
            synthesizer,
            splitter,
            client,
            language: language.to_string(),
            state: Arc::new(RwLock::new(SynthesisState::Idle)),
        }
    }

    /// Shared view of the stage state, readable from other threads.
    pub fn state_handle(&self) -> Arc<RwLock<SynthesisState>> {
        Arc::clone(&self.state)
    }

    pub fn state(&self) -> SynthesisState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn transition(&self, next: SynthesisState) {
        tracing::trace!(?next, "synthesis state");
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = next;
    }

    fn speak(&self, text: &str) -> Result<usize, StageError> {
        self.transition(SynthesisState::Splitting);
        let utterances = self.splitter.split(text)?;
        let total = utterances.len();

        for (index, utterance) in utterances.iter().enumerate() {
            self.transition(SynthesisState::Synthesizing { index, total });
            let buffer = self
                .synthesizer
                .synthesize(utterance.as_str(), &self.language)
                .map_err(|e| utterance_error(index, total, e))?;

            self.transition(SynthesisState::Delivering { index, total });
            tracing::debug!(
                utterance = index + 1,
                total,
                duration_ms = buffer.duration_ms(),
                mode = ?self.client.mode(),
                "delivering utterance"
            );
            self.client
                .deliver(&buffer)
                .map_err(|e| utterance_error(index, total, e))?;
        }

        Ok(total)
    }
}

fn utterance_error(index: usize, total: usize, error: crate::error::FacetalkError) -> StageError {
    StageError::Recoverable(format!("utterance {}/{}: {}", index + 1, total, error))
}

impl Stage for SynthesisStage {
    type Request = String;
    type Response = SpokenResponse;

    fn name(&self) -> &'static str {
        "synthesis"
    }

    fn process(&mut self, text: String) -> Result<Option<SpokenResponse>, StageError> {
        let outcome = self.speak(&text);
        self.transition(SynthesisState::Idle);
        let utterances = outcome?;
        Ok(Some(SpokenResponse { text, utterances }))
    }
}
