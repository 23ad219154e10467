//! Stage sequencing for one extraction run

use crate::chunking::Segmenter;
use crate::combiner::combine;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::extraction::extract_all;
use crate::mapper::map_extractions;
use crate::report::{FailureReport, RunMetadata, RunReport, SegmentFailure};
use crate::run::{RunContext, RunState, Transition};
use crate::summarizer::summarize_all;
use precis_domain::traits::{ContextRetriever, LlmProvider, NullRetriever};
use precis_domain::{Document, RunId, SCHEMA_VERSION};
use precis_llm::{GenerativeClient, LlmError};
use precis_validator::Validator;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Lifecycle tracker for a single run
#[derive(Debug)]
struct Progress {
    run_id: RunId,
    started: Instant,
    inner: Mutex<ProgressState>,
}

#[derive(Debug)]
struct ProgressState {
    state: RunState,
    transitions: Vec<Transition>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Progress {
    fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            started: Instant::now(),
            inner: Mutex::new(ProgressState {
                state: RunState::Segmenting,
                transitions: vec![Transition {
                    state: RunState::Segmenting,
                    at_ms: 0,
                }],
            }),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn advance(&self, next: RunState) {
        let mut inner = lock(&self.inner);
        if !inner.state.can_advance_to(next) {
            warn!(run_id = %self.run_id, from = %inner.state, to = %next, "ignoring illegal state change");
            return;
        }
        info!(run_id = %self.run_id, from = %inner.state, to = %next, "run state");
        inner.state = next;
        let at_ms = self.elapsed_ms();
        inner.transitions.push(Transition { state: next, at_ms });
    }

    fn fail(&self, err: PipelineError) -> PipelineError {
        error!(run_id = %self.run_id, error = %err, "run failed");
        self.advance(RunState::Failed);
        err
    }

    fn transitions(&self) -> Vec<Transition> {
        lock(&self.inner).transitions.clone()
    }
}

/// Runs documents through segmentation, summarization, combination,
/// extraction, mapping and validation
///
/// # Example
///
/// ```
/// use precis_extractor::{Orchestrator, PipelineConfig};
/// use precis_domain::Document;
/// use precis_llm::MockProvider;
///
/// # tokio_test::block_on(async {
/// let provider = MockProvider::new(r#"{"summary": "A trial.", "key_points": []}"#);
/// let orchestrator = Orchestrator::new(provider, PipelineConfig::default()).unwrap();
///
/// let report = orchestrator.run(Document::new("Adults were randomised.")).await.unwrap();
/// assert_eq!(report.metadata.segments, 1);
/// # });
/// ```
pub struct Orchestrator<P> {
    client: GenerativeClient<P>,
    config: Arc<PipelineConfig>,
    retriever: Arc<dyn ContextRetriever>,
    validator: Validator,
}

impl<P> Orchestrator<P>
where
    P: LlmProvider<Error = LlmError> + 'static,
{
    /// Create an orchestrator; the configuration is validated first
    pub fn new(provider: P, config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            client: GenerativeClient::new(provider, config.retry.clone()),
            validator: Validator::new(config.validation.clone()),
            retriever: Arc::new(NullRetriever),
            config: Arc::new(config),
        })
    }

    /// Use a retrieval service for facet context
    pub fn with_retriever(mut self, retriever: Arc<dyn ContextRetriever>) -> Self {
        self.retriever = retriever;
        self
    }

    /// Replace the validator built from the configuration
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    /// Active configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Generative client shared by every stage
    pub fn client(&self) -> &GenerativeClient<P> {
        &self.client
    }

    /// Run the pipeline on a document
    pub async fn run(&self, document: Document) -> Result<RunReport, PipelineError> {
        self.run_with_cancel(document, CancellationToken::new()).await
    }

    /// Run the pipeline, stopping as soon as `cancel` fires
    ///
    /// Cancellation drops every in-flight call; no partial report is returned.
    pub async fn run_with_cancel(
        &self,
        document: Document,
        cancel: CancellationToken,
    ) -> Result<RunReport, PipelineError> {
        let ctx = RunContext::new(document, Arc::clone(&self.config));
        let progress = Progress::new(ctx.run_id);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(run_id = %ctx.run_id, "run cancelled");
                progress.advance(RunState::Cancelled);
                Err(PipelineError::Cancelled)
            }
            result = self.execute(&ctx, &progress) => result,
        }
    }

    async fn execute(&self, ctx: &RunContext, progress: &Progress) -> Result<RunReport, PipelineError> {
        let config = &ctx.config;
        info!(
            run_id = %ctx.run_id,
            model = self.client.model_name(),
            chars = ctx.document.text.len(),
            "run started"
        );

        let segmenter = Segmenter::new(
            config.chunk_strategy,
            config.max_segment_chars,
            config.segment_overlap_chars,
        );
        let segments = segmenter
            .segment(&ctx.document.text)
            .map_err(|err| progress.fail(err))?;
        info!(run_id = %ctx.run_id, segments = segments.len(), "document segmented");

        progress.advance(RunState::Summarizing);
        let partials = summarize_all(ctx, &self.client, &segments).await;
        let segment_failures: Vec<SegmentFailure> = partials
            .iter()
            .enumerate()
            .filter_map(|(index, partial)| {
                partial.as_ref().err().map(|failure| SegmentFailure {
                    index,
                    failure: failure.clone(),
                })
            })
            .collect();

        progress.advance(RunState::Combining);
        let combined = combine(ctx, &self.client, &partials).await.map_err(|_| {
            progress.fail(PipelineError::NoUsablePartials {
                segments: segments.len(),
            })
        })?;

        progress.advance(RunState::Extracting);
        let extractions = extract_all(
            ctx,
            &self.client,
            &combined.overview,
            Arc::clone(&self.retriever),
        )
        .await;

        let mut raw = BTreeMap::new();
        let mut facet_failures = BTreeMap::new();
        for (facet, outcome) in extractions {
            match outcome {
                Ok(value) => {
                    raw.insert(facet, value);
                }
                Err(failure) => {
                    facet_failures.insert(facet, failure);
                }
            }
        }

        progress.advance(RunState::Mapping);
        let mapped = map_extractions(&raw);

        progress.advance(RunState::Validating);
        let issues = self.validator.validate(&mapped.summary);
        let advisories = self.validator.advisories(&mapped.notes);

        progress.advance(RunState::Done);
        let failures = FailureReport {
            segment_failures,
            facet_failures,
            overview_fallback: combined.fallback,
        };
        let metadata = RunMetadata {
            model: self.client.model_name().to_string(),
            segments: segments.len(),
            partials_used: combined.overview.partials_used,
            elapsed_ms: progress.elapsed_ms(),
            schema_version: SCHEMA_VERSION,
        };
        info!(
            run_id = %ctx.run_id,
            issues = issues.len(),
            defaulted = failures.facet_failures.len(),
            failed_segments = failures.segment_failures.len(),
            elapsed_ms = metadata.elapsed_ms,
            "run finished"
        );

        Ok(RunReport {
            run_id: ctx.run_id,
            summary: mapped.summary,
            issues,
            advisories,
            failures,
            notes: mapped.notes,
            overview: combined.overview,
            transitions: progress.transitions(),
            metadata,
        })
    }
}
