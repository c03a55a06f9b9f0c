//! Chat completion engines.

pub mod completion;
pub mod ollama;
pub mod openai;

pub use completion::{CompletionEngine, CompletionRequest, MockCompletion};

use crate::config::{CompletionConfig, api_key_from_env};
use crate::defaults;
use crate::error::{FacetalkError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Selectable completion engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompletionKind {
    #[default]
    OpenAi,
    Ollama,
}

impl std::str::FromStr for CompletionKind {
    type Err = FacetalkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "open_ai" => Ok(CompletionKind::OpenAi),
            "ollama" | "llama" => Ok(CompletionKind::Ollama),
            other => Err(FacetalkError::UnsupportedEngine {
                kind: "completion".to_string(),
                name: other.to_string(),
            }),
        }
    }
}

/// Builds the configured completion engine.
pub fn build_completion(config: &CompletionConfig) -> Result<Arc<dyn CompletionEngine>> {
    let timeout = Duration::from_secs(defaults::HTTP_TIMEOUT_SECS);
    match config.engine {
        CompletionKind::OpenAi => {
            let key_var = config
                .api_key_env
                .as_deref()
                .unwrap_or(defaults::OPENAI_API_KEY_ENV);
            let url = config
                .base_url
                .as_deref()
                .unwrap_or(defaults::OPENAI_BASE_URL);
            Ok(Arc::new(openai::OpenAiCompletion::new(
                url,
                api_key_from_env(key_var),
                timeout,
            )?))
        }
        CompletionKind::Ollama => {
            let url = config
                .base_url
                .as_deref()
                .unwrap_or(defaults::OLLAMA_BASE_URL);
            Ok(Arc::new(ollama::OllamaCompletion::new(url, timeout)?))
        }
    }
}
