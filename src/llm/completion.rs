use crate::error::{FacetalkError, Result};
use crate::pipeline::context::ChatMessage;
use std::sync::{Arc, Mutex};

/// Everything a completion engine needs for one reply.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Trait for chat completion backends.
pub trait CompletionEngine: Send + Sync {
    /// Produce the assistant reply for a conversation.
    fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Engine name for logs.
    fn name(&self) -> &str;
}

impl<T: CompletionEngine> CompletionEngine for Arc<T> {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        (**self).complete(request)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Mock completion engine for testing
///
/// Replies from a script (cycling), or echoes the last user message when
/// the script is empty.
#[derive(Debug, Clone, Default)]
pub struct MockCompletion {
    replies: Vec<String>,
    should_fail: bool,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the mock to answer with a fixed reply
    pub fn with_response(mut self, reply: &str) -> Self {
        self.replies = vec![reply.to_string()];
        self
    }

    /// Configure successive replies
    pub fn with_responses(mut self, replies: &[&str]) -> Self {
        self.replies = replies.iter().map(|r| r.to_string()).collect();
        self
    }

    /// Configure the mock to fail on complete
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl CompletionEngine for MockCompletion {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let index = {
            let mut requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
            requests.push(request.clone());
            requests.len() - 1
        };
        if self.should_fail {
            return Err(FacetalkError::Completion {
                message: "mock completion failure".to_string(),
            });
        }
        if self.replies.is_empty() {
            let last = request
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            return Ok(format!("You said: {}", last));
        }
        Ok(self.replies[index % self.replies.len()].clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(text: &str) -> CompletionRequest {
        CompletionRequest {
            model: "test".to_string(),
            messages: vec![ChatMessage::developer("sys"), ChatMessage::user(text)],
            max_tokens: 10,
            temperature: 0.0,
        }
    }

    #[test]
    fn test_mock_echoes_without_script() {
        let engine = MockCompletion::new();
        assert_eq!(engine.complete(&request("hi")).unwrap(), "You said: hi");
    }

    #[test]
    fn test_mock_cycles_scripted_replies() {
        let engine = MockCompletion::new().with_responses(&["one", "two"]);
        assert_eq!(engine.complete(&request("a")).unwrap(), "one");
        assert_eq!(engine.complete(&request("b")).unwrap(), "two");
        assert_eq!(engine.complete(&request("c")).unwrap(), "one");
        assert_eq!(engine.requests().len(), 3);
    }

    #[test]
    fn test_mock_failure() {
        let engine = MockCompletion::new().with_failure();
        assert!(matches!(
            engine.complete(&request("x")),
            Err(FacetalkError::Completion { .. })
        ));
        assert_eq!(engine.requests().len(), 1);
    }
}
