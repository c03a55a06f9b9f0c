//! Data passed between pipeline stages.

use std::time::Instant;

/// A queued unit of work. Identity is its queue position.
#[derive(Debug, Clone)]
pub struct StageRequest<T> {
    pub payload: T,
    pub enqueued_at: Instant,
}

impl<T> StageRequest<T> {
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            enqueued_at: Instant::now(),
        }
    }
}

/// Outcome of one processed request. At most one per request.
#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent<T> {
    Completed(T),
    Failed { stage: &'static str, message: String },
}

/// Recognized user speech.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
}

/// A reply that was fully synthesized and delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpokenResponse {
    pub text: String,
    /// Number of utterances delivered, one session each.
    pub utterances: usize,
}

/// Events surfaced to whoever drives the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// User text entered the conversation.
    Transcript(String),
    /// The assistant replied.
    Response(String),
    /// A reply reached the animation service.
    Spoken(SpokenResponse),
    Failed { stage: &'static str, message: String },
}
