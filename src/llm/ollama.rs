//! Ollama `/api/chat` completions.
//!
//! Replies stream back as newline-delimited JSON, each line carrying a piece
//! of the assistant message.

use crate::error::{FacetalkError, Result};
use crate::llm::completion::{CompletionEngine, CompletionRequest};
use crate::pipeline::context::{ChatMessage, Role};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Deserialize)]
struct StreamLine {
    #[serde(default)]
    message: Option<StreamMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamMessage {
    #[serde(default)]
    content: String,
}

/// Ollama has no developer role; instructions go in as `system`.
fn wire_role(role: Role) -> &'static str {
    match role {
        Role::Developer => "system",
        other => other.as_str(),
    }
}

fn to_wire(messages: &[ChatMessage]) -> Vec<OllamaMessage<'_>> {
    messages
        .iter()
        .map(|m| OllamaMessage {
            role: wire_role(m.role),
            content: &m.content,
        })
        .collect()
}

/// Concatenates the message pieces of a streamed body.
///
/// Malformed lines are logged and skipped. An `error` line fails the whole reply.
pub fn parse_stream(body: &str) -> Result<String> {
    let mut reply = String::new();
    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let parsed: StreamLine = match serde_json::from_str(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, line, "skipping malformed completion line");
                continue;
            }
        };
        if let Some(error) = parsed.error {
            return Err(FacetalkError::Completion { message: error });
        }
        if let Some(message) = parsed.message {
            reply.push_str(&message.content);
        }
    }
    Ok(reply.trim().to_string())
}

pub struct OllamaCompletion {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl OllamaCompletion {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FacetalkError::Completion {
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl CompletionEngine for OllamaCompletion {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = OllamaRequest {
            model: &request.model,
            messages: to_wire(&request.messages),
            stream: true,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let text = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .map_err(|e| FacetalkError::Completion {
                message: format!("Ollama request failed: {}", e),
            })?;
        parse_stream(&text)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
