//! Speech synthesis engines.

pub mod coqui;
pub mod openai;
pub mod synthesizer;

pub use synthesizer::{MockSynthesizer, SpeechSynthesizer};

use crate::config::{SynthesisConfig, api_key_from_env};
use crate::defaults;
use crate::error::{FacetalkError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Selectable synthesis engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SynthesizerKind {
    #[default]
    Coqui,
    OpenAi,
}

impl std::str::FromStr for SynthesizerKind {
    type Err = FacetalkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "coqui" => Ok(SynthesizerKind::Coqui),
            "openai" | "open_ai" => Ok(SynthesizerKind::OpenAi),
            other => Err(FacetalkError::UnsupportedEngine {
                kind: "synthesis".to_string(),
                name: other.to_string(),
            }),
        }
    }
}

/// Builds the configured synthesizer.
pub fn build_synthesizer(config: &SynthesisConfig) -> Result<Arc<dyn SpeechSynthesizer>> {
    let timeout = Duration::from_secs(defaults::HTTP_TIMEOUT_SECS);
    match config.engine {
        SynthesizerKind::Coqui => {
            let url = config
                .base_url
                .as_deref()
                .unwrap_or(defaults::COQUI_BASE_URL);
            Ok(Arc::new(coqui::CoquiSynthesizer::new(
                url,
                config.voice.clone(),
                timeout,
            )?))
        }
        SynthesizerKind::OpenAi => {
            let key_var = config
                .api_key_env
                .as_deref()
                .unwrap_or(defaults::OPENAI_API_KEY_ENV);
            let url = config
                .base_url
                .as_deref()
                .unwrap_or(defaults::OPENAI_BASE_URL);
            Ok(Arc::new(openai::OpenAiSynthesizer::new(
                url,
                api_key_from_env(key_var),
                config.model.clone(),
                config.voice.clone(),
                timeout,
            )?))
        }
    }
}
