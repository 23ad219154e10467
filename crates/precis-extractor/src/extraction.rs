//! Parallel execution of the specialized extractors

use crate::config::effective_concurrency;
use crate::facets::{overview_excerpt, registry, select_context};
use crate::prompt::facet_prompt;
use crate::run::RunContext;
use precis_domain::traits::{ContextRetriever, LlmProvider};
use precis_domain::{Facet, Overview};
use precis_llm::{Failure, GenerativeClient, LlmError};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Run every registered extractor against the overview
///
/// Returns one entry per facet, keyed in registry order. A facet whose call
/// fails, or whose task never reports back, maps to a [`Failure`]; the other
/// facets are unaffected.
pub async fn extract_all<P>(
    ctx: &RunContext,
    client: &GenerativeClient<P>,
    overview: &Overview,
    retriever: Arc<dyn ContextRetriever>,
) -> BTreeMap<Facet, Result<Value, Failure>>
where
    P: LlmProvider<Error = LlmError> + 'static,
{
    let permits = effective_concurrency(Facet::ALL.len(), ctx.config.max_extraction_concurrency);
    let semaphore = Arc::new(Semaphore::new(permits));
    let excerpt: Arc<str> = Arc::from(overview_excerpt(overview, &ctx.config));
    let mut tasks = JoinSet::new();

    for spec in registry() {
        let ctx = ctx.clone();
        let client = client.clone();
        let retriever = Arc::clone(&retriever);
        let semaphore = Arc::clone(&semaphore);
        let excerpt = Arc::clone(&excerpt);

        tasks.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    return (spec.facet, Err(Failure::aborted("concurrency limiter closed")))
                }
            };
            let context = select_context(spec, &ctx.document, retriever.as_ref(), &ctx.config).await;
            let prompt = facet_prompt(spec, &context, &excerpt);
            debug!(run_id = %ctx.run_id, facet = %spec.facet, prompt_chars = prompt.len(), "extracting");
            (spec.facet, client.invoke_json(&prompt, spec.schema).await)
        });
    }

    let mut results: BTreeMap<Facet, Result<Value, Failure>> = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((facet, outcome)) => {
                if let Err(failure) = &outcome {
                    warn!(
                        run_id = %ctx.run_id,
                        facet = %facet,
                        kind = failure.kind.as_str(),
                        attempts = failure.attempts,
                        "extraction failed: {}",
                        failure.reason
                    );
                }
                results.insert(facet, outcome);
            }
            Err(err) => {
                warn!(run_id = %ctx.run_id, error = %err, "extraction task did not complete");
            }
        }
    }

    for facet in Facet::ALL {
        results
            .entry(facet)
            .or_insert_with(|| Err(Failure::aborted("extraction task did not complete")));
    }
    results
}
