//! Reduction of partial summaries into one overview

use crate::chunking::truncate_chars;
use crate::prompt::combine_prompt;
use crate::run::RunContext;
use precis_domain::traits::LlmProvider;
use precis_domain::{Overview, OverviewSource, PartialSummary};
use precis_llm::{Failure, FailureKind, GenerativeClient, LlmError};
use tracing::{info, warn};

/// Overview plus the combine failure it recovered from, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combined {
    /// Overview handed to the extractors
    pub overview: Overview,

    /// Why the synthesized overview was replaced by concatenation
    pub fallback: Option<Failure>,
}

/// Merge the usable partial summaries into an overview
///
/// `partials` is the summarizer output in segment order. Failed entries are
/// skipped. When the combine call itself fails the usable summaries are
/// concatenated in order instead, so a run only errors here when there is
/// nothing usable at all.
pub async fn combine<P>(
    ctx: &RunContext,
    client: &GenerativeClient<P>,
    partials: &[Result<PartialSummary, Failure>],
) -> Result<Combined, Failure>
where
    P: LlmProvider<Error = LlmError>,
{
    let usable: Vec<&PartialSummary> = partials.iter().filter_map(|p| p.as_ref().ok()).collect();
    if usable.is_empty() {
        return Err(Failure::new(FailureKind::Permanent, "no usable partial summaries"));
    }

    let config = &ctx.config;
    let key_points: Vec<&str> = usable
        .iter()
        .flat_map(|p| p.key_points.iter().map(String::as_str))
        .take(config.max_key_points)
        .collect();

    let prompt = combine_prompt(&usable, &key_points);
    let (text, source, fallback) = match client.invoke_text(&prompt).await {
        Ok(text) => (text.trim().to_string(), OverviewSource::Synthesized, None),
        Err(failure) => {
            warn!(
                run_id = %ctx.run_id,
                kind = failure.kind.as_str(),
                "combine call failed, concatenating summaries: {}",
                failure.reason
            );
            (concatenate(&usable), OverviewSource::Concatenated, Some(failure))
        }
    };

    let overview = Overview {
        text: truncate_chars(&text, config.max_overview_chars).to_string(),
        partials_used: usable.len(),
        source,
    };
    info!(
        run_id = %ctx.run_id,
        partials = overview.partials_used,
        chars = overview.text.len(),
        "overview ready"
    );

    Ok(Combined { overview, fallback })
}

/// Summaries joined in segment order
fn concatenate(partials: &[&PartialSummary]) -> String {
    partials
        .iter()
        .map(|p| format!("Part {}:\n{}", p.segment_index + 1, p.summary.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partial(index: usize, summary: &str) -> PartialSummary {
        PartialSummary {
            segment_index: index,
            summary: summary.to_string(),
            key_points: Vec::new(),
        }
    }

    #[test]
    fn test_concatenate_keeps_segment_order() {
        let a = partial(0, "First.");
        let c = partial(2, " Third. ");
        assert_eq!(concatenate(&[&a, &c]), "Part 1:\nFirst.\n\nPart 3:\nThird.");
    }
}
