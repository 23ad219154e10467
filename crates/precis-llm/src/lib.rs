//! Precis LLM Provider Layer
//!
//! Pluggable generative-text providers plus the retrying client every
//! pipeline stage calls through.
//!
//! # Architecture
//!
//! This crate provides implementations of the `LlmProvider` trait from
//! `precis-domain` and the [`GenerativeClient`] wrapper that adds per-call
//! timeouts, exponential backoff and malformed-output recovery on top of any
//! provider.
//!
//! # Providers
//!
//! - `MockProvider`: Deterministic, scriptable mock for testing
//! - `OllamaProvider`: Local Ollama API integration
//!
//! # Examples
//!
//! ```
//! use precis_llm::{GenerativeClient, MockProvider, RetryPolicy};
//!
//! # tokio_test::block_on(async {
//! let client = GenerativeClient::new(MockProvider::new(r#"{"summary": "ok"}"#), RetryPolicy::default());
//! let value = client.invoke_json("summarize", "{}").await.unwrap();
//! assert_eq!(value["summary"], "ok");
//! # });
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod ollama;
pub mod response;

use async_trait::async_trait;
use precis_domain::traits::LlmProvider as LlmProviderTrait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

pub use client::{Failure, FailureKind, GenerativeClient, RetryPolicy};
pub use ollama::OllamaProvider;
pub use response::extract_json;

/// Errors that can occur during LLM operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Invalid response from LLM (unparseable or wrong shape)
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Call did not finish within its timeout
    #[error("Timed out after {0} ms")]
    Timeout(u64),

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

impl LlmError {
    /// Whether retrying the identical request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::Communication(_) | LlmError::RateLimitExceeded | LlmError::Timeout(_)
        )
    }

    /// Whether the service answered but the answer was unusable
    pub fn is_malformed(&self) -> bool {
        matches!(self, LlmError::InvalidResponse(_))
    }
}

#[derive(Debug, Clone)]
enum MockReply {
    Text(String),
    Error(LlmError),
}

#[derive(Debug, Clone)]
struct MockRule {
    pattern: String,
    reply: MockReply,
    // None = unlimited
    remaining: Option<usize>,
}

/// Mock LLM provider for deterministic testing
///
/// Replies are chosen by the first registered rule whose pattern is a
/// substring of the prompt; when no rule matches the default response is
/// returned. No network calls are made.
///
/// # Examples
///
/// ```
/// use precis_llm::{LlmError, MockProvider};
/// use precis_domain::traits::LlmProvider;
///
/// # tokio_test::block_on(async {
/// // Simple fixed response
/// let provider = MockProvider::new("Fixed response");
/// assert_eq!(provider.generate("any prompt").await.unwrap(), "Fixed response");
///
/// // Pattern-matched responses
/// let mut provider = MockProvider::default();
/// provider.add_response("Part 1/", "first");
/// provider.add_error("Part 2/", LlmError::RateLimitExceeded);
/// assert_eq!(provider.generate("summarize Part 1/2").await.unwrap(), "first");
/// assert!(provider.generate("summarize Part 2/2").await.is_err());
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    default_response: String,
    rules: Arc<Mutex<Vec<MockRule>>>,
    latencies: Arc<Mutex<Vec<(String, Duration)>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    structured_calls: Arc<Mutex<HashMap<String, usize>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockProvider {
    /// Create a new MockProvider with a fixed response for all prompts
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            rules: Arc::new(Mutex::new(Vec::new())),
            latencies: Arc::new(Mutex::new(Vec::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            structured_calls: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Reply with `response` to every prompt containing `pattern`
    pub fn add_response(&mut self, pattern: impl Into<String>, response: impl Into<String>) {
        self.push_rule(pattern.into(), MockReply::Text(response.into()), None);
    }

    /// Fail every prompt containing `pattern` with `error`
    pub fn add_error(&mut self, pattern: impl Into<String>, error: LlmError) {
        self.push_rule(pattern.into(), MockReply::Error(error), None);
    }

    /// Fail the next `times` prompts containing `pattern`, then fall through
    /// to later rules or the default response
    pub fn add_failures(&mut self, pattern: impl Into<String>, times: usize, error: LlmError) {
        self.push_rule(pattern.into(), MockReply::Error(error), Some(times));
    }

    /// Reply with `response` to the next `times` prompts containing `pattern`
    pub fn add_responses_once(
        &mut self,
        pattern: impl Into<String>,
        times: usize,
        response: impl Into<String>,
    ) {
        self.push_rule(pattern.into(), MockReply::Text(response.into()), Some(times));
    }

    /// Delay replies to prompts containing `pattern`
    pub fn add_latency(&mut self, pattern: impl Into<String>, delay: Duration) {
        lock(&self.latencies).push((pattern.into(), delay));
    }

    fn push_rule(&mut self, pattern: String, reply: MockReply, remaining: Option<usize>) {
        lock(&self.rules).push(MockRule {
            pattern,
            reply,
            remaining,
        });
    }

    /// Get the number of times a generate method was called
    pub fn call_count(&self) -> usize {
        lock(&self.prompts).len()
    }

    /// Number of calls whose prompt contained `pattern`
    pub fn calls_matching(&self, pattern: &str) -> usize {
        lock(&self.prompts)
            .iter()
            .filter(|p| p.contains(pattern))
            .count()
    }

    /// Every prompt received, in arrival order
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    /// Number of structured calls made with the given schema
    pub fn structured_calls(&self, schema: &str) -> usize {
        lock(&self.structured_calls).get(schema).copied().unwrap_or(0)
    }

    /// Reset the recorded prompts
    pub fn reset_call_count(&self) {
        lock(&self.prompts).clear();
    }

    fn reply_for(&self, prompt: &str) -> (MockReply, Duration) {
        lock(&self.prompts).push(prompt.to_string());

        let delay = lock(&self.latencies)
            .iter()
            .find(|(pattern, _)| prompt.contains(pattern.as_str()))
            .map(|(_, delay)| *delay)
            .unwrap_or(Duration::ZERO);

        let mut rules = lock(&self.rules);
        for rule in rules.iter_mut() {
            if !prompt.contains(rule.pattern.as_str()) || rule.remaining == Some(0) {
                continue;
            }
            if let Some(remaining) = rule.remaining.as_mut() {
                *remaining -= 1;
            }
            return (rule.reply.clone(), delay);
        }

        (MockReply::Text(self.default_response.clone()), delay)
    }

    async fn respond(&self, prompt: &str) -> Result<String, LlmError> {
        let (reply, delay) = self.reply_for(prompt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match reply {
            MockReply::Text(text) => Ok(text),
            MockReply::Error(err) => Err(err),
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("Default mock response")
    }
}

#[async_trait]
impl LlmProviderTrait for MockProvider {
    type Error = LlmError;

    async fn generate(&self, prompt: &str) -> Result<String, Self::Error> {
        self.respond(prompt).await
    }

    async fn generate_structured(&self, prompt: &str, schema: &str) -> Result<String, Self::Error> {
        *lock(&self.structured_calls).entry(schema.to_string()).or_insert(0) += 1;
        self.respond(prompt).await
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
