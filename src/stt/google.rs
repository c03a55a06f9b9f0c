//! Google Web Speech API v2 recognizer.
//!
//! Audio is uploaded as raw big-endian 16-bit PCM (`audio/l16`). The service
//! answers with one JSON object per line; the first is usually an empty
//! `{"result":[]}` placeholder.

use crate::audio::buffer::AudioSegment;
use crate::error::{FacetalkError, Result};
use crate::stt::recognizer::SpeechRecognizer;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ResponseLine {
    #[serde(default)]
    result: Vec<ResultEntry>,
}

#[derive(Debug, Deserialize)]
struct ResultEntry {
    #[serde(default)]
    alternative: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    transcript: String,
}

/// Extracts the best transcript from a line-delimited response body.
///
/// Lines that fail to parse are logged and skipped; the first non-empty
/// transcript wins. Returns an empty string when no line carries one.
pub fn parse_response(body: &str) -> String {
    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let parsed: ResponseLine = match serde_json::from_str(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, line, "skipping malformed recognition line");
                continue;
            }
        };
        let best = parsed
            .result
            .iter()
            .flat_map(|r| r.alternative.first())
            .map(|a| a.transcript.trim())
            .find(|t| !t.is_empty());
        if let Some(transcript) = best {
            return transcript.to_string();
        }
    }
    String::new()
}

/// Recognizer backed by the Google Web Speech endpoint.
pub struct GoogleWebSpeech {
    client: reqwest::blocking::Client,
    url: String,
    api_key: Option<String>,
}

impl GoogleWebSpeech {
    pub fn new(url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FacetalkError::Recognition {
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            url: url.to_string(),
            api_key,
        })
    }
}

impl SpeechRecognizer for GoogleWebSpeech {
    fn recognize(&self, segment: &AudioSegment, language: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| FacetalkError::Recognition {
                message: "No Google API key configured".to_string(),
            })?;
        let body: Vec<u8> = segment
            .samples
            .iter()
            .flat_map(|s| s.to_be_bytes())
            .collect();

        let response = self
            .client
            .post(&self.url)
            .query(&[
                ("client", "chromium"),
                ("lang", language),
                ("key", api_key),
                ("output", "json"),
            ])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("audio/l16; rate={}", segment.sample_rate),
            )
            .body(body)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| FacetalkError::Recognition {
                message: format!("Google Web Speech request failed: {}", e),
            })?;

        let text = response.text().map_err(|e| FacetalkError::Recognition {
            message: format!("Failed to read Google Web Speech response: {}", e),
        })?;
        Ok(parse_response(&text))
    }

    fn name(&self) -> &str {
        "google_web_speech"
    }
}
