//! OpenAI-compatible `/v1/audio/transcriptions` recognizer.

use crate::audio::buffer::AudioSegment;
use crate::audio::wav;
use crate::error::{FacetalkError, Result};
use crate::stt::recognizer::SpeechRecognizer;
use reqwest::blocking::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;

const MODEL: &str = "whisper-1";

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Whisper models take ISO 639-1 codes, so `en-US` becomes `en`.
fn primary_language(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or(tag)
}

pub struct WhisperApi {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: Option<String>,
}

impl WhisperApi {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FacetalkError::Recognition {
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

impl SpeechRecognizer for WhisperApi {
    fn recognize(&self, segment: &AudioSegment, language: &str) -> Result<String> {
        let wav_bytes = wav::encode_segment(segment)?;
        let file = Part::bytes(wav_bytes)
            .file_name("segment.wav")
            .mime_str("audio/wav")
            .map_err(|e| FacetalkError::Recognition {
                message: format!("Invalid upload part: {}", e),
            })?;
        let form = Form::new()
            .part("file", file)
            .text("model", MODEL)
            .text("language", primary_language(language).to_string());

        let mut request = self
            .client
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response: TranscriptionResponse = request
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| FacetalkError::Recognition {
                message: format!("Whisper API request failed: {}", e),
            })?;
        Ok(response.text.trim().to_string())
    }

    fn name(&self) -> &str {
        "whisper_api"
    }
}
