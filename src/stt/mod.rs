//! Speech recognition engines.

pub mod google;
pub mod recognizer;
pub mod whisper_api;

pub use recognizer::{MockRecognizer, SpeechRecognizer};

use crate::config::{RecognitionConfig, api_key_from_env};
use crate::defaults;
use crate::error::{FacetalkError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Selectable recognition engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecognizerKind {
    #[default]
    GoogleWebSpeech,
    WhisperApi,
}

impl std::str::FromStr for RecognizerKind {
    type Err = FacetalkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "google" | "google_web_speech" => Ok(RecognizerKind::GoogleWebSpeech),
            "whisper" | "whisper_api" => Ok(RecognizerKind::WhisperApi),
            other => Err(FacetalkError::UnsupportedEngine {
                kind: "recognition".to_string(),
                name: other.to_string(),
            }),
        }
    }
}

/// Builds the configured recognizer.
pub fn build_recognizer(config: &RecognitionConfig) -> Result<Arc<dyn SpeechRecognizer>> {
    let timeout = Duration::from_secs(defaults::HTTP_TIMEOUT_SECS);
    match config.engine {
        RecognizerKind::GoogleWebSpeech => {
            let key_var = config
                .api_key_env
                .as_deref()
                .unwrap_or(defaults::GOOGLE_API_KEY_ENV);
            let url = config
                .base_url
                .as_deref()
                .unwrap_or(defaults::GOOGLE_SPEECH_URL);
            Ok(Arc::new(google::GoogleWebSpeech::new(
                url,
                api_key_from_env(key_var),
                timeout,
            )?))
        }
        RecognizerKind::WhisperApi => {
            let key_var = config
                .api_key_env
                .as_deref()
                .unwrap_or(defaults::OPENAI_API_KEY_ENV);
            let url = config
                .base_url
                .as_deref()
                .unwrap_or(defaults::OPENAI_BASE_URL);
            Ok(Arc::new(whisper_api::WhisperApi::new(
                url,
                api_key_from_env(key_var),
                timeout,
            )?))
        }
    }
}
