//! Configuration for the pipeline

use crate::error::PipelineError;
use precis_llm::RetryPolicy;
use precis_validator::ValidationConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Preferred breakpoint when segmenting a document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkStrategy {
    /// Break at blank lines between paragraphs
    #[default]
    ByParagraph,
    /// Break before markdown or numbered headings, else at paragraphs
    BySection,
    /// Break at sentence ends, else at whitespace
    ByTokenCount,
}

/// Configuration for a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Segmentation breakpoint preference
    pub chunk_strategy: ChunkStrategy,

    /// Maximum segment size (bytes)
    pub max_segment_chars: usize,

    /// Context carried over from the previous segment (bytes)
    pub segment_overlap_chars: usize,

    /// Concurrent summary calls
    pub max_summary_concurrency: usize,

    /// Concurrent facet extraction calls
    pub max_extraction_concurrency: usize,

    /// Maximum overview size (bytes)
    pub max_overview_chars: usize,

    /// Key points forwarded to the combine prompt
    pub max_key_points: usize,

    /// Retrieval snippets requested per facet
    pub max_context_items: usize,

    /// Smallest section or retrieval context worth using instead of the overview
    pub min_context_chars: usize,

    /// Maximum facet context size (bytes)
    pub max_context_chars: usize,

    /// Timeouts and retries for every generative call
    pub retry: RetryPolicy,

    /// Validator rules
    pub validation: ValidationConfig,
}

impl Default for PipelineConfig {
    /// Default configuration with balanced settings
    fn default() -> Self {
        Self {
            chunk_strategy: ChunkStrategy::ByParagraph,
            max_segment_chars: 4096,
            segment_overlap_chars: 512,
            max_summary_concurrency: 10,
            max_extraction_concurrency: 5,
            max_overview_chars: 8000,
            max_key_points: 20,
            max_context_items: 6,
            min_context_chars: 80,
            max_context_chars: 6000,
            retry: RetryPolicy::default(),
            validation: ValidationConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Aggressive preset: smaller segments, more parallelism, fewer retries
    pub fn aggressive() -> Self {
        Self {
            max_segment_chars: 2048,
            segment_overlap_chars: 256,
            max_summary_concurrency: 16,
            max_extraction_concurrency: 8,
            max_overview_chars: 6000,
            max_context_chars: 4000,
            retry: RetryPolicy {
                max_attempts: 2,
                initial_backoff_ms: 500,
                max_backoff_ms: 2000,
                call_timeout_ms: 30_000,
            },
            ..Self::default()
        }
    }

    /// Lenient preset: larger section-aligned segments, patient retries
    pub fn lenient() -> Self {
        Self {
            chunk_strategy: ChunkStrategy::BySection,
            max_segment_chars: 8192,
            segment_overlap_chars: 1024,
            max_summary_concurrency: 4,
            max_extraction_concurrency: 2,
            max_overview_chars: 12_000,
            max_key_points: 30,
            max_context_chars: 10_000,
            retry: RetryPolicy {
                max_attempts: 5,
                initial_backoff_ms: 2000,
                max_backoff_ms: 30_000,
                call_timeout_ms: 180_000,
            },
            validation: ValidationConfig::permissive(),
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), PipelineError> {
        let fail = |msg: &str| Err(PipelineError::Config(msg.to_string()));

        if self.max_segment_chars == 0 {
            return fail("max_segment_chars must be greater than 0");
        }
        if self.segment_overlap_chars >= self.max_segment_chars {
            return fail("segment_overlap_chars must be smaller than max_segment_chars");
        }
        if self.max_summary_concurrency == 0 {
            return fail("max_summary_concurrency must be greater than 0");
        }
        if self.max_extraction_concurrency == 0 {
            return fail("max_extraction_concurrency must be greater than 0");
        }
        if self.max_overview_chars == 0 {
            return fail("max_overview_chars must be greater than 0");
        }
        if self.max_context_chars == 0 {
            return fail("max_context_chars must be greater than 0");
        }
        if self.min_context_chars > self.max_context_chars {
            return fail("min_context_chars cannot exceed max_context_chars");
        }
        if self.retry.max_attempts == 0 {
            return fail("retry.max_attempts must be greater than 0");
        }
        if self.retry.call_timeout_ms == 0 {
            return fail("retry.call_timeout_ms must be greater than 0");
        }
        if self.retry.max_backoff_ms < self.retry.initial_backoff_ms {
            return fail("retry.max_backoff_ms cannot be below retry.initial_backoff_ms");
        }
        let validation = &self.validation;
        if validation.ratio_min >= validation.ratio_max {
            return fail("validation.ratio_min must be below validation.ratio_max");
        }
        Ok(())
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, PipelineError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Load and validate configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, PipelineError> {
        toml::to_string_pretty(self)
            .map_err(|e| PipelineError::Config(format!("Failed to serialize to TOML: {}", e)))
    }
}

/// Permits for a fan-out stage: one per task up to the configured cap
pub fn effective_concurrency(tasks: usize, cap: usize) -> usize {
    tasks.min(cap).max(1)
}
