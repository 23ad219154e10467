//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the pipeline and the services it
//! talks to. Infrastructure implementations live in other crates.

use async_trait::async_trait;

/// Trait for generative-text provider operations
///
/// Implemented by the infrastructure layer (precis-llm). One call is one
/// request/response exchange; retries and timeouts are the caller's concern.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Error type for provider operations
    type Error: Send;

    /// Generate a text completion
    async fn generate(&self, prompt: &str) -> Result<String, Self::Error>;

    /// Generate output constrained to a JSON template (if supported)
    async fn generate_structured(&self, prompt: &str, schema: &str) -> Result<String, Self::Error>;

    /// Model identifier for run metadata
    fn model_name(&self) -> &str {
        "llm"
    }
}

/// Trait for the retrieval collaborator
///
/// Returns up to `max_items` text snippets relevant to `query`, best first.
/// How snippets are indexed or ranked is outside the pipeline's concern.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    /// Fetch context snippets for a query
    async fn get_context(&self, query: &str, max_items: usize) -> Vec<String>;
}

/// Retriever for runs without a retrieval service; always returns nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRetriever;

#[async_trait]
impl ContextRetriever for NullRetriever {
    async fn get_context(&self, _query: &str, _max_items: usize) -> Vec<String> {
        Vec::new()
    }
}

/// Retriever backed by a fixed list of snippets (useful for tests and replays)
#[derive(Debug, Clone, Default)]
pub struct StaticRetriever {
    snippets: Vec<String>,
}

impl StaticRetriever {
    /// Create a retriever that always answers with the given snippets
    pub fn new(snippets: Vec<String>) -> Self {
        Self { snippets }
    }
}

#[async_trait]
impl ContextRetriever for StaticRetriever {
    async fn get_context(&self, _query: &str, max_items: usize) -> Vec<String> {
        self.snippets.iter().take(max_items).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_retriever_is_empty() {
        assert!(NullRetriever.get_context("anything", 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_static_retriever_respects_max_items() {
        let retriever = StaticRetriever::new(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(retriever.get_context("q", 2).await, vec!["a", "b"]);
    }
}
