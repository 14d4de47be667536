//! LLM inference capability.
//!
//! The core consumes inference as an opaque capability: given a backend
//! model selector and a fully rendered prompt, return text or an error.
//! Timeout and retry policy belong to the implementation, not the core.

mod ollama;

pub use ollama::{OllamaClient, OllamaConfig};

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

/// Errors that can occur during an inference call
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Stateless inference client - each call is independent.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Single completion request, blocking until complete.
    async fn infer(&self, model: &str, prompt: &str) -> Result<String, InferenceError>;
}

/// Scripted inference client for tests.
///
/// Pops one scripted reply per call and records every (model, prompt) pair
/// so tests can assert on call counts and rendered prompts.
pub struct MockInference {
    replies: Mutex<VecDeque<Result<String, String>>>,
    fixed: Option<Result<String, String>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockInference {
    /// Always reply with the same text.
    pub fn always(reply: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fixed: Some(Ok(reply.to_string())),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always fail with the given message.
    pub fn failing(message: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fixed: Some(Err(message.to_string())),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Reply from a script, one entry per call. `Err` entries become
    /// inference failures. Exhausting the script is an error.
    pub fn scripted(replies: Vec<Result<String, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fixed: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Recorded (model, prompt) pairs.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceClient for MockInference {
    async fn infer(&self, model: &str, prompt: &str) -> Result<String, InferenceError> {
        self.calls
            .lock()
            .unwrap()
            .push((model.to_string(), prompt.to_string()));

        let reply = match &self.fixed {
            Some(fixed) => fixed.clone(),
            None => self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| InferenceError::InvalidResponse("mock script exhausted".to_string()))?,
        };

        reply.map_err(|msg| InferenceError::Api { status: 500, message: msg })
    }
}
