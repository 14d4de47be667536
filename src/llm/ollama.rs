//! Ollama chat client implementation
//!
//! This module implements the InferenceClient trait against a local Ollama
//! server's chat endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::llm::{InferenceClient, InferenceError};

/// Default Ollama endpoint
const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Configuration for the Ollama client
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    /// Generation can be slow; this is a transport-level ceiling, not a
    /// core-enforced job timeout.
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Ollama API client
pub struct OllamaClient {
    client: Client,
    config: OllamaConfig,
}

impl OllamaClient {
    /// Create a new Ollama client.
    pub fn new(config: OllamaConfig) -> Result<Self, InferenceError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.config.base_url.trim_end_matches('/'))
    }

    fn parse_response(body: Value) -> Result<String, InferenceError> {
        body["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| InferenceError::InvalidResponse("missing message.content".to_string()))
    }
}

#[async_trait]
impl InferenceClient for OllamaClient {
    async fn infer(&self, model: &str, prompt: &str) -> Result<String, InferenceError> {
        let body = json!({
            "model": model,
            "messages": [{"role": "user", "content": prompt}],
            "stream": false,
        });

        let response = self.client.post(self.chat_url()).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(InferenceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| InferenceError::InvalidResponse(e.to_string()))?;
        Self::parse_response(body)
    }
}
