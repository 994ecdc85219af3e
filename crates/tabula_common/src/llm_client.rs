//! LLM Client Abstraction
//!
//! Generic interface for calling an OpenAI-compatible completion backend with a
//! JSON response contract, plus a fake client for tests.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Body fragment the provider returns when the key cannot use the model
const MODEL_ACCESS_DENIED: &str = "does not exist or you do not have access to it";

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    /// Already-resolved credential; never prompted for.
    #[serde(skip)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com".to_string(),
            model: "gpt-4o".to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

/// LLM errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("No API key configured for the LLM backend")]
    MissingApiKey,

    #[error("Model {0} does not exist or you do not have access to it")]
    ModelNotFound(String),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Invalid JSON response: {0}")]
    InvalidJson(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("LLM returned empty response")]
    EmptyResponse,
}

/// Generic LLM client trait
pub trait LlmClient: Send + Sync {
    /// Call LLM with a prompt and expect JSON response
    fn call_json(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        schema_description: &str,
    ) -> Result<serde_json::Value, LlmError>;
}

/// OpenAI-compatible chat completions over blocking HTTP
pub struct HttpLlmClient {
    config: LlmConfig,
    client: reqwest::blocking::Client,
}

impl HttpLlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

impl LlmClient for HttpLlmClient {
    fn call_json(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        schema_description: &str,
    ) -> Result<serde_json::Value, LlmError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(LlmError::MissingApiKey)?;

        let url = format!(
            "{}/v1/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        );

        let full_prompt = format!(
            "{}\n\nYou must respond with valid JSON matching this schema:\n{}",
            user_prompt, schema_description
        );

        let request_body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": full_prompt},
            ],
            "response_format": {"type": "json_object"},
        });

        tracing::debug!("POST {} (model {})", url, self.config.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request_body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.config.timeout_secs)
                } else {
                    LlmError::HttpError(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            if status == reqwest::StatusCode::NOT_FOUND && body.contains(MODEL_ACCESS_DENIED) {
                return Err(LlmError::ModelNotFound(self.config.model.clone()));
            }
            return Err(LlmError::HttpError(format!(
                "HTTP {} from OpenAI-compatible API",
                status
            )));
        }

        let response_json: serde_json::Value = response
            .json()
            .map_err(|e| LlmError::InvalidJson(format!("Failed to parse response: {}", e)))?;

        let text = response_json
            .get("choices")
            .and_then(|v| v.get(0))
            .and_then(|v| v.get("message"))
            .and_then(|v| v.get("content"))
            .and_then(|v| v.as_str())
            .ok_or(LlmError::EmptyResponse)?;

        serde_json::from_str(text)
            .map_err(|e| LlmError::InvalidJson(format!("LLM output is not valid JSON: {}", e)))
    }
}

/// Fake LLM client for testing
pub struct FakeLlmClient {
    responses: std::sync::Mutex<Vec<Result<serde_json::Value, LlmError>>>,
    prompts: std::sync::Mutex<Vec<String>>,
}

impl FakeLlmClient {
    /// Create a fake client with pre-defined responses
    pub fn new(responses: Vec<Result<serde_json::Value, LlmError>>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses),
            prompts: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Create a fake client that always returns valid JSON
    pub fn always_valid(json: serde_json::Value) -> Self {
        Self::new(vec![Ok(json)])
    }

    /// Create a fake client that always returns an error
    pub fn always_error(error: LlmError) -> Self {
        Self::new(vec![Err(error)])
    }

    /// Get the number of calls made
    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// User prompts received so far
    pub fn user_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl LlmClient for FakeLlmClient {
    fn call_json(
        &self,
        _system_prompt: &str,
        user_prompt: &str,
        _schema_description: &str,
    ) -> Result<serde_json::Value, LlmError> {
        self.prompts.lock().unwrap().push(user_prompt.to_string());

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        if responses.len() == 1 {
            // Keep returning the same response
            responses[0].clone()
        } else {
            responses.remove(0)
        }
    }
}
