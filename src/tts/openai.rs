//! OpenAI-compatible `/v1/audio/speech` synthesizer.

use crate::audio::buffer::AudioBuffer;
use crate::audio::wav;
use crate::error::{FacetalkError, Result};
use crate::tts::synthesizer::SpeechSynthesizer;
use serde::Serialize;
use std::time::Duration;

const DEFAULT_MODEL: &str = "tts-1";
const DEFAULT_VOICE: &str = "alloy";

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'static str,
}

pub struct OpenAiSynthesizer {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    voice: String,
}

impl OpenAiSynthesizer {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: Option<String>,
        voice: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FacetalkError::Synthesis {
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            voice: voice.unwrap_or_else(|| DEFAULT_VOICE.to_string()),
        })
    }
}

impl SpeechSynthesizer for OpenAiSynthesizer {
    // The speech endpoint infers language from the input text.
    fn synthesize(&self, text: &str, _language: &str) -> Result<AudioBuffer> {
        let body = SpeechRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            response_format: "wav",
        };

        let mut request = self
            .client
            .post(format!("{}/v1/audio/speech", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let bytes = request
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.bytes())
            .map_err(|e| FacetalkError::Synthesis {
                message: format!("OpenAI speech request failed: {}", e),
            })?;
        wav::decode_wav(&bytes)
    }

    fn name(&self) -> &str {
        "open_ai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_model_and_voice() {
        let synth =
            OpenAiSynthesizer::new("http://localhost/", None, None, None, Duration::from_secs(1))
                .unwrap();
        assert_eq!(synth.model, "tts-1");
        assert_eq!(synth.voice, "alloy");
        assert_eq!(synth.base_url, "http://localhost");
    }

    #[test]
    fn test_request_asks_for_wav() {
        let body = SpeechRequest {
            model: "tts-1",
            input: "Hi.",
            voice: "nova",
            response_format: "wav",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["response_format"], "wav");
        assert_eq!(json["voice"], "nova");
    }
}
