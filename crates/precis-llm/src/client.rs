//! Retrying client around a generative provider
//!
//! [`GenerativeClient`] turns one logical request into up to
//! `max_attempts` provider calls. Each attempt has its own deadline.
//! Transient errors back off exponentially. Malformed output is retried with
//! a corrective instruction appended to the prompt. Everything else fails
//! immediately. The caller always gets a value back: the parsed answer or a
//! [`Failure`] describing why there is none.

use crate::response::extract_json;
use crate::LlmError;
use precis_domain::traits::LlmProvider;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry and timeout settings for generative calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per logical call, first attempt included
    pub max_attempts: u32,

    /// Backoff before the second attempt, doubled for each later one
    pub initial_backoff_ms: u64,

    /// Upper bound for any single backoff
    pub max_backoff_ms: u64,

    /// Deadline for a single provider call
    pub call_timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 8000,
            call_timeout_ms: 60_000,
        }
    }
}

impl RetryPolicy {
    /// Policy with no waiting between attempts, for tests and replays
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
            ..Self::default()
        }
    }

    /// Deadline for one provider call
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Wait after the given failed attempt (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let millis = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }
}

/// Why a call produced no usable output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Retries exhausted on rate limits, timeouts or network errors
    Transient,

    /// The service answered but the answer could not be used
    Malformed,

    /// Retrying cannot help (unknown model, rejected request)
    Permanent,

    /// The task was cancelled or panicked before finishing
    Aborted,
}

impl FailureKind {
    /// Kind name
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Transient => "transient",
            FailureKind::Malformed => "malformed",
            FailureKind::Permanent => "permanent",
            FailureKind::Aborted => "aborted",
        }
    }
}

/// Placeholder result of a task that produced no usable output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Failure class
    pub kind: FailureKind,

    /// Last error message
    pub reason: String,

    /// Provider calls made before giving up
    pub attempts: u32,
}

impl Failure {
    /// Create a failure without any provider attempts
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
            attempts: 0,
        }
    }

    /// Failure for output that arrived but could not be used
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::new(FailureKind::Malformed, reason)
    }

    /// Failure for a task that never completed
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::new(FailureKind::Aborted, reason)
    }

    /// Classify a provider error
    pub fn from_error(error: &LlmError, attempts: u32) -> Self {
        let kind = if error.is_transient() {
            FailureKind::Transient
        } else if error.is_malformed() {
            FailureKind::Malformed
        } else {
            FailureKind::Permanent
        };
        Self {
            kind,
            reason: error.to_string(),
            attempts,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failure after {} attempt(s): {}",
            self.kind.as_str(),
            self.attempts,
            self.reason
        )
    }
}

fn corrective_prompt(prompt: &str, error: &LlmError, attempt: u32) -> String {
    format!(
        "{prompt}\n\nYour previous reply could not be used ({error}). \
         Reply again with one valid JSON value only: no prose, no code fences. \
         Unusable replies so far: {attempt}."
    )
}

/// Generative client with timeouts, retries and JSON recovery
///
/// Cheap to clone; clones share the provider.
pub struct GenerativeClient<P> {
    provider: Arc<P>,
    policy: RetryPolicy,
}

impl<P> Clone for GenerativeClient<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            policy: self.policy.clone(),
        }
    }
}

impl<P> fmt::Debug for GenerativeClient<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerativeClient")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<P> GenerativeClient<P>
where
    P: LlmProvider<Error = LlmError>,
{
    /// Wrap a provider
    pub fn new(provider: P, policy: RetryPolicy) -> Self {
        Self::from_arc(Arc::new(provider), policy)
    }

    /// Wrap a shared provider
    pub fn from_arc(provider: Arc<P>, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    /// Active retry policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Underlying provider
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Model identifier of the underlying provider
    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Free-text call
    pub async fn invoke_text(&self, prompt: &str) -> Result<String, Failure> {
        self.call_with_retry(prompt, None, |text| {
            if text.trim().is_empty() {
                Err(LlmError::InvalidResponse("Empty response".to_string()))
            } else {
                Ok(text)
            }
        })
        .await
    }

    /// Structured call; the answer must be a JSON object or array
    pub async fn invoke_json(&self, prompt: &str, schema: &str) -> Result<Value, Failure> {
        self.call_with_retry(prompt, Some(schema), |text| extract_json(&text))
            .await
    }

    /// Structured call whose parsed answer must also pass `accept`
    ///
    /// A rejected answer counts as malformed and is retried with a correction.
    pub async fn invoke_json_as<T>(
        &self,
        prompt: &str,
        schema: &str,
        accept: impl Fn(Value) -> Result<T, String>,
    ) -> Result<T, Failure> {
        self.call_with_retry(prompt, Some(schema), |text| {
            let value = extract_json(&text)?;
            accept(value).map_err(LlmError::InvalidResponse)
        })
        .await
    }

    async fn call_with_retry<T>(
        &self,
        prompt: &str,
        schema: Option<&str>,
        accept: impl Fn(String) -> Result<T, LlmError>,
    ) -> Result<T, Failure> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut current = prompt.to_string();
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(attempt, prompt_chars = current.len(), "llm call");

            let call = async {
                match schema {
                    Some(schema) => self.provider.generate_structured(&current, schema).await,
                    None => self.provider.generate(&current).await,
                }
            };
            let outcome = match tokio::time::timeout(self.policy.call_timeout(), call).await {
                Ok(Ok(text)) => {
                    debug!(attempt, response_chars = text.len(), "llm reply");
                    accept(text)
                }
                Ok(Err(err)) => Err(err),
                Err(_) => Err(LlmError::Timeout(self.policy.call_timeout_ms)),
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if attempt >= max_attempts || !(err.is_transient() || err.is_malformed()) {
                return Err(Failure::from_error(&err, attempt));
            }

            if err.is_malformed() {
                warn!(attempt, error = %err, "unusable reply, retrying with correction");
                current = corrective_prompt(prompt, &err, attempt);
            } else {
                let delay = self.policy.backoff(attempt);
                warn!(attempt, error = %err, delay_ms = delay.as_millis() as u64, "transient failure, backing off");
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockProvider;

    fn client(provider: &MockProvider, attempts: u32) -> GenerativeClient<MockProvider> {
        GenerativeClient::new(provider.clone(), RetryPolicy::immediate(attempts))
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.call_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff(2), Duration::from_millis(2000));
        assert_eq!(policy.backoff(3), Duration::from_millis(4000));
        assert_eq!(policy.backoff(4), Duration::from_millis(8000));
        assert_eq!(policy.backoff(10), Duration::from_millis(8000));
        assert_eq!(policy.backoff(200), Duration::from_millis(8000));
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let mut provider = MockProvider::new(r#"{"ok": true}"#);
        provider.add_failures("q", 2, LlmError::RateLimitExceeded);

        let value = client(&provider, 3).invoke_json("q", "{}").await.unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let mut provider = MockProvider::default();
        provider.add_error("q", LlmError::Communication("reset".into()));

        let failure = client(&provider, 3).invoke_text("q").await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Transient);
        assert_eq!(failure.attempts, 3);
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let mut provider = MockProvider::default();
        provider.add_error("q", LlmError::ModelNotAvailable("x".into()));

        let failure = client(&provider, 5).invoke_text("q").await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Permanent);
        assert_eq!(failure.attempts, 1);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_reply_retried_with_different_prompt() {
        let mut provider = MockProvider::new(r#"{"summary": "fixed"}"#);
        provider.add_responses_once("extract", 1, "Sorry, I cannot do that.");

        let value = client(&provider, 3)
            .invoke_json("extract", "{}")
            .await
            .unwrap();
        assert_eq!(value["summary"], "fixed");

        let prompts = provider.prompts();
        assert_eq!(prompts.len(), 2);
        assert_ne!(prompts[0], prompts[1]);
        assert!(prompts[1].starts_with("extract"));
        assert!(prompts[1].contains("valid JSON"));

        // the same bad reply repeated still yields a new prompt each time
        let stubborn = MockProvider::new("not json at all");
        let failure = client(&stubborn, 4)
            .invoke_json("extract", "{}")
            .await
            .unwrap_err();
        assert_eq!(failure.attempts, 4);

        let prompts = stubborn.prompts();
        assert_eq!(prompts.len(), 4);
        for (i, earlier) in prompts.iter().enumerate() {
            for later in &prompts[i + 1..] {
                assert_ne!(earlier, later);
            }
        }
    }

    #[tokio::test]
    async fn test_malformed_exhausted() {
        let provider = MockProvider::new("not json at all");
        let failure = client(&provider, 2)
            .invoke_json("extract", "{}")
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::Malformed);
        assert_eq!(failure.attempts, 2);
    }

    #[tokio::test]
    async fn test_rejected_shape_is_retried() {
        let mut provider = MockProvider::new(r#"{"summary": "second try"}"#);
        provider.add_responses_once("summarize", 1, r#"{"text": "wrong key"}"#);

        let summary = client(&provider, 3)
            .invoke_json_as("summarize", "{}", |value| {
                value["summary"]
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| "missing summary".to_string())
            })
            .await
            .unwrap();
        assert_eq!(summary, "second try");
        assert!(provider.prompts()[1].contains("missing summary"));
    }

    #[tokio::test]
    async fn test_call_timeout() {
        let mut provider = MockProvider::new("late");
        provider.add_latency("slow", Duration::from_millis(200));
        let policy = RetryPolicy {
            call_timeout_ms: 20,
            ..RetryPolicy::immediate(2)
        };

        let failure = GenerativeClient::new(provider.clone(), policy)
            .invoke_text("slow")
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::Transient);
        assert_eq!(failure.attempts, 2);
        assert!(failure.reason.contains("Timed out"));
    }

    #[tokio::test]
    async fn test_structured_calls_use_schema() {
        let provider = MockProvider::new("[1]");
        client(&provider, 1).invoke_json("p", "SCHEMA").await.unwrap();
        assert_eq!(provider.structured_calls("SCHEMA"), 1);
    }

    #[test]
    fn test_failure_display() {
        let failure = Failure::from_error(&LlmError::RateLimitExceeded, 3);
        assert_eq!(
            failure.to_string(),
            "transient failure after 3 attempt(s): Rate limit exceeded"
        );
    }
}
