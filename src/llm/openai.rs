//! OpenAI-compatible chat completions.

use crate::error::{FacetalkError, Result};
use crate::llm::completion::{CompletionEngine, CompletionRequest};
use crate::pipeline::context::ChatMessage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Pulls the first choice's text out of a response body.
fn parse_reply(body: &str) -> Result<String> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| FacetalkError::Completion {
            message: format!("Malformed completion response: {}", e),
        })?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .ok_or_else(|| FacetalkError::Completion {
            message: "Completion response contained no choices".to_string(),
        })
}

pub struct OpenAiCompletion {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiCompletion {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FacetalkError::Completion {
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

impl CompletionEngine for OpenAiCompletion {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = ChatRequest {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let mut http = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key);
        }

        let text = http
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .map_err(|e| FacetalkError::Completion {
                message: format!("OpenAI request failed: {}", e),
            })?;
        parse_reply(&text)
    }

    fn name(&self) -> &str {
        "open_ai"
    }
}
