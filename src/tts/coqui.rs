//! Coqui TTS server (`tts-server`) synthesizer.

use crate::audio::buffer::AudioBuffer;
use crate::audio::wav;
use crate::error::{FacetalkError, Result};
use crate::tts::synthesizer::SpeechSynthesizer;
use std::time::Duration;

pub struct CoquiSynthesizer {
    client: reqwest::blocking::Client,
    base_url: String,
    speaker: Option<String>,
}

impl CoquiSynthesizer {
    pub fn new(base_url: &str, speaker: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FacetalkError::Synthesis {
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            speaker,
        })
    }
}

impl SpeechSynthesizer for CoquiSynthesizer {
    fn synthesize(&self, text: &str, language: &str) -> Result<AudioBuffer> {
        let mut query = vec![("text", text), ("language_id", language)];
        if let Some(speaker) = &self.speaker {
            query.push(("speaker_id", speaker.as_str()));
        }

        let bytes = self
            .client
            .get(format!("{}/api/tts", self.base_url))
            .query(&query)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.bytes())
            .map_err(|e| FacetalkError::Synthesis {
                message: format!("Coqui request failed: {}", e),
            })?;
        wav::decode_wav(&bytes)
    }

    fn name(&self) -> &str {
        "coqui"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_server_is_synthesis_error() {
        let synth =
            CoquiSynthesizer::new("http://127.0.0.1:1", None, Duration::from_millis(500)).unwrap();
        assert!(matches!(
            synth.synthesize("hello", "en"),
            Err(FacetalkError::Synthesis { .. })
        ));
    }
}
