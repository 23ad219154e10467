//! Fan-out summarization of segments

use crate::config::effective_concurrency;
use crate::prompt::summary_prompt;
use crate::run::RunContext;
use precis_domain::traits::LlmProvider;
use precis_domain::{PartialSummary, Segment};
use precis_llm::{Failure, GenerativeClient, LlmError};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

const SUMMARY_SCHEMA: &str = r#"{"summary": "string", "key_points": ["string"]}"#;

/// Summarize every segment, at most `max_summary_concurrency` at a time
///
/// The result has exactly one entry per segment, in segment order, whatever
/// order the calls complete in. A task that panics or never reports back
/// leaves an `Aborted` failure in its slot.
pub async fn summarize_all<P>(
    ctx: &RunContext,
    client: &GenerativeClient<P>,
    segments: &[Segment],
) -> Vec<Result<PartialSummary, Failure>>
where
    P: LlmProvider<Error = LlmError> + 'static,
{
    let total = segments.len();
    let permits = effective_concurrency(total, ctx.config.max_summary_concurrency);
    let semaphore = Arc::new(Semaphore::new(permits));
    let mut tasks = JoinSet::new();

    debug!(run_id = %ctx.run_id, segments = total, permits, "summarizing segments");

    for (slot, segment) in segments.iter().enumerate() {
        let client = client.clone();
        let semaphore = Arc::clone(&semaphore);
        let prompt = summary_prompt(segment, total);
        let segment_index = segment.index;

        tasks.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return (slot, Err(Failure::aborted("concurrency limiter closed"))),
            };
            let outcome = client
                .invoke_json_as(&prompt, SUMMARY_SCHEMA, |value| {
                    parse_partial(segment_index, value)
                })
                .await;
            (slot, outcome)
        });
    }

    let mut slots: Vec<Option<Result<PartialSummary, Failure>>> = vec![None; total];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((slot, outcome)) => {
                if let Err(failure) = &outcome {
                    warn!(
                        run_id = %ctx.run_id,
                        segment = slot,
                        kind = failure.kind.as_str(),
                        attempts = failure.attempts,
                        "segment summary failed: {}",
                        failure.reason
                    );
                }
                slots[slot] = Some(outcome);
            }
            Err(err) => {
                warn!(run_id = %ctx.run_id, error = %err, "summary task did not complete");
            }
        }
    }

    slots
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| Err(Failure::aborted("summary task did not complete"))))
        .collect()
}

/// Read a summary reply
///
/// `key_points` may be a list or a single string; anything else in it is
/// ignored. A reply without summary text is rejected.
fn parse_partial(segment_index: usize, value: Value) -> Result<PartialSummary, String> {
    let summary = value
        .get("summary")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "reply has no summary text".to_string())?;

    let key_points = match value.get("key_points") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    };

    Ok(PartialSummary {
        segment_index,
        summary: summary.to_string(),
        key_points,
    })
}
