//! facetalk - Conversational speech pipeline for facial animation
//!
//! Recognizes speech, asks a language model for a reply, synthesizes the
//! reply sentence by sentence and streams the audio to an animation service.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod delivery;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod stt;
pub mod text;
pub mod tts;

// Engine seams
pub use llm::CompletionEngine;
pub use stt::SpeechRecognizer;
pub use tts::SpeechSynthesizer;

// Pipeline
pub use pipeline::{PipelineCoordinator, PipelineEvent, PipelineHandle};

// Delivery
pub use delivery::{AudioReceiver, AudioStreamClient, AudioTransport, DeliveryMode};

// Error handling
pub use error::{FacetalkError, Result};

// Config
pub use config::Config;

// Stage framework
pub use pipeline::error::{ErrorReporter, StageError};
pub use pipeline::queue::{Stage, StageQueue};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
