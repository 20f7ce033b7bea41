//! Chat-completion client shared by the remote hooks
//!
//! Sends a system/user message pair, asks for a JSON object response, and
//! returns the parsed JSON content of the first choice. Calls are blocking
//! and bounded by the configured timeout.

use super::HookError;
use crate::config::LlmConfig;
use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Blocking client for an OpenAI-compatible chat-completions endpoint
#[derive(Debug, Clone)]
pub struct CompletionClient {
    http: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl CompletionClient {
    /// Create a client from the LLM section of the configuration
    pub fn new(config: &LlmConfig) -> Result<Self, HookError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HookError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            timeout,
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run one completion and parse its content as JSON
    pub fn complete_json(&self, system: &str, user: &str) -> Result<Value, HookError> {
        let key = self.api_key.as_deref().ok_or(HookError::MissingApiKey)?;

        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "response_format": {"type": "json_object"},
        });

        debug!(endpoint = %self.endpoint, model = %self.model, "Sending completion request");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(key)
            .json(&payload)
            .send()
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HookError::Status(status.as_u16()));
        }

        let body: Value = response.json().map_err(|e| {
            if e.is_timeout() {
                HookError::Timeout(self.timeout)
            } else {
                HookError::MalformedResponse(format!("body is not JSON: {}", e))
            }
        })?;

        let content = body
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                HookError::MalformedResponse("missing choices[0].message.content".to_string())
            })?;

        serde_json::from_str(content)
            .map_err(|e| HookError::MalformedResponse(format!("content is not JSON: {}", e)))
    }

    fn classify(&self, err: reqwest::Error) -> HookError {
        if err.is_timeout() {
            HookError::Timeout(self.timeout)
        } else {
            HookError::Transport(err.to_string())
        }
    }
}
