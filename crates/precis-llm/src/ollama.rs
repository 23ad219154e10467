//! Ollama Provider Implementation
//!
//! Provides integration with Ollama's local LLM API so papers can be
//! processed without sending text to a hosted service.
//!
//! One trait call is one HTTP exchange. Retries, backoff and per-call
//! deadlines belong to [`GenerativeClient`](crate::GenerativeClient).
//!
//! # Examples
//!
//! ```no_run
//! use precis_llm::{GenerativeClient, OllamaProvider, RetryPolicy};
//!
//! let provider = OllamaProvider::new("http://localhost:11434", "llama3");
//! let client = GenerativeClient::new(provider, RetryPolicy::default());
//! ```

use crate::LlmError;
use async_trait::async_trait;
use precis_domain::traits::LlmProvider as LlmProviderTrait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Ollama API endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Default HTTP timeout for a single request (120 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Default sampling temperature; extraction wants stable output
pub const DEFAULT_TEMPERATURE: f32 = 0.0;

/// Ollama API provider for local LLM inference
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    endpoint: String,
    model: String,
    temperature: f32,
    timeout: Duration,
    client: reqwest::Client,
}

/// Request body for Ollama generate API
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Response from Ollama generate API
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

impl OllamaProvider {
    /// Create a new Ollama provider
    ///
    /// # Parameters
    ///
    /// - `endpoint`: Ollama API endpoint (e.g., "http://localhost:11434")
    /// - `model`: Model to use (e.g., "llama3", "mistral")
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        let timeout = Duration::from_secs(DEFAULT_TIMEOUT_SECS);
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            timeout,
            client: build_client(timeout),
        }
    }

    /// Create a new Ollama provider at `http://localhost:11434`
    pub fn default_endpoint(model: impl Into<String>) -> Self {
        Self::new(DEFAULT_ENDPOINT, model)
    }

    /// Set the HTTP timeout for a single request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.client = build_client(timeout);
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    async fn send(&self, prompt: &str, json_mode: bool) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.endpoint);

        let request_body = OllamaGenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: json_mode.then_some("json"),
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout.as_millis() as u64)
                } else {
                    LlmError::Communication(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LlmError::ModelNotAvailable(self.model.clone()));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimitExceeded);
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let err = format!("HTTP {}: {}", status, error_text);
            return if status.is_server_error() {
                Err(LlmError::Communication(err))
            } else {
                Err(LlmError::Other(err))
            };
        }

        let body = response
            .json::<OllamaGenerateResponse>()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;
        Ok(body.response)
    }
}

#[async_trait]
impl LlmProviderTrait for OllamaProvider {
    type Error = LlmError;

    async fn generate(&self, prompt: &str) -> Result<String, Self::Error> {
        self.send(prompt, false).await
    }

    async fn generate_structured(&self, prompt: &str, _schema: &str) -> Result<String, Self::Error> {
        // The template is already part of the prompt; JSON mode constrains the syntax
        self.send(prompt, true).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_provider_creation() {
        let provider = OllamaProvider::new("http://localhost:11434/", "llama3");
        assert_eq!(provider.endpoint, "http://localhost:11434");
        assert_eq!(provider.model_name(), "llama3");
        assert_eq!(provider.temperature, DEFAULT_TEMPERATURE);
    }

    #[test]
    fn test_ollama_provider_default_endpoint() {
        let provider = OllamaProvider::default_endpoint("mistral");
        assert_eq!(provider.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(provider.model, "mistral");
    }

    #[test]
    fn test_request_serialization() {
        let request = OllamaGenerateRequest {
            model: "llama3",
            prompt: "hi",
            stream: false,
            format: Some("json"),
            options: OllamaOptions { temperature: 0.0 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["format"], "json");
        assert_eq!(json["stream"], false);

        let plain = OllamaGenerateRequest {
            format: None,
            ..request
        };
        let json = serde_json::to_value(&plain).unwrap();
        assert!(json.get("format").is_none());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transient() {
        // Port 9 (discard) on loopback is not an HTTP server
        let provider = OllamaProvider::new("http://127.0.0.1:9", "llama3")
            .with_timeout(Duration::from_millis(500));
        let err = provider.generate("hello").await.unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err:?}");
    }
}
