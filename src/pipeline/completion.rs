//! Completion stage: conversation snapshots to assistant replies.

use crate::config::CompletionConfig;
use crate::llm::completion::{CompletionEngine, CompletionRequest};
use crate::pipeline::context::ChatMessage;
use crate::pipeline::error::StageError;
use crate::pipeline::queue::Stage;
use std::sync::Arc;

pub struct CompletionStage {
    engine: Arc<dyn CompletionEngine>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl CompletionStage {
    pub fn new(engine: Arc<dyn CompletionEngine>, config: &CompletionConfig) -> Self {
        Self {
            engine,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

impl Stage for CompletionStage {
    type Request = Vec<ChatMessage>;
    type Response = String;

    fn name(&self) -> &'static str {
        "completion"
    }

    fn process(&mut self, messages: Vec<ChatMessage>) -> Result<Option<String>, StageError> {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        tracing::debug!(
            engine = self.engine.name(),
            model = %request.model,
            messages = request.messages.len(),
            "requesting completion"
        );

        let reply = self.engine.complete(&request).map_err(StageError::from)?;
        if reply.trim().is_empty() {
            tracing::warn!(engine = self.engine.name(), "empty completion, skipping");
            return Ok(None);
        }
        Ok(Some(reply))
    }
}
