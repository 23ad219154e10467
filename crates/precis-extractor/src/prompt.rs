//! Prompt construction for the three kinds of generative call

use crate::facets::{ContextSource, FacetContext, FacetSpec};
use precis_domain::{PartialSummary, Segment};

const SUMMARY_INSTRUCTIONS: &str = r#"Summarize this part of the paper in a few sentences. Keep every number
exactly as written: sample sizes, effect estimates, confidence intervals,
p-values and percentages. Name the arms and outcomes the text mentions.
Do not guess at content from other parts of the paper."#;

const SUMMARY_FORMAT: &str = r#"Respond in JSON:
{
  "summary": "a few sentences",
  "key_points": ["point 1", "point 2"]
}

Remember: Return ONLY valid JSON, no markdown code blocks, no explanations."#;

const COMBINE_INSTRUCTIONS: &str = r#"You are combining summaries of consecutive parts of one clinical trial
research paper into a single overview. Keep the order of the paper. Keep
every number exactly as written. Remove repetition between parts. Do not
add anything that is not in the summaries."#;

/// Prompt for summarizing one segment
pub fn summary_prompt(segment: &Segment, total: usize) -> String {
    let mut prompt = format!(
        "You are summarizing Part {}/{} of a clinical trial research paper.\n\n",
        segment.index + 1,
        total
    );
    prompt.push_str(SUMMARY_INSTRUCTIONS);
    prompt.push_str("\n\n");

    if !segment.overlap.is_empty() {
        prompt.push_str("Context from the previous part (do not summarize it):\n---\n");
        prompt.push_str(&segment.overlap);
        prompt.push_str("\n---\n\n");
    }

    prompt.push_str("Text to summarize:\n---\n");
    prompt.push_str(&segment.text);
    prompt.push_str("\n---\n\n");
    prompt.push_str(SUMMARY_FORMAT);
    prompt
}

/// Prompt for merging the partial summaries into an overview
///
/// `partials` must already be in segment order.
pub fn combine_prompt(partials: &[&PartialSummary], key_points: &[&str]) -> String {
    let mut prompt = String::from(COMBINE_INSTRUCTIONS);
    prompt.push_str("\n\n");

    for partial in partials {
        prompt.push_str(&format!(
            "Part {}:\n{}\n\n",
            partial.segment_index + 1,
            partial.summary.trim()
        ));
    }

    if !key_points.is_empty() {
        prompt.push_str("Key points:\n");
        for point in key_points {
            prompt.push_str(&format!("- {}\n", point));
        }
        prompt.push('\n');
    }

    prompt.push_str("Write the overview as plain prose. No JSON, no headings.");
    prompt
}

/// Prompt for one specialized extraction task
pub fn facet_prompt(spec: &FacetSpec, context: &FacetContext, overview: &str) -> String {
    let mut prompt = format!("Extraction task: {}\n\n", spec.facet);
    prompt.push_str(spec.instructions);
    prompt.push_str("\n\n");

    match &context.source {
        ContextSource::Section(name) => {
            prompt.push_str(&format!("Relevant text ({} section):\n---\n", name));
            prompt.push_str(&context.text);
            prompt.push_str("\n---\n\n");
        }
        ContextSource::Retrieval => {
            prompt.push_str("Relevant excerpts:\n---\n");
            prompt.push_str(&context.text);
            prompt.push_str("\n---\n\n");
        }
        ContextSource::Overview => {}
    }

    prompt.push_str("Paper Overview:\n---\n");
    prompt.push_str(overview);
    prompt.push_str("\n---\n\n");

    prompt.push_str("Respond in JSON:\n");
    prompt.push_str(spec.schema);
    prompt.push_str(
        "\n\nUse null for anything the paper does not report. \
         Return ONLY valid JSON, no markdown code blocks, no explanations.",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facets::spec;
    use precis_domain::Facet;

    fn segment(index: usize, overlap: &str) -> Segment {
        Segment {
            index,
            text: "Patients were randomised 1:1.".to_string(),
            overlap: overlap.to_string(),
            approx_tokens: 8,
        }
    }

    #[test]
    fn test_summary_prompt_numbers_parts_from_one() {
        let prompt = summary_prompt(&segment(2, ""), 5);
        assert!(prompt.contains("Part 3/5"));
        assert!(prompt.contains("Patients were randomised 1:1."));
        assert!(prompt.contains("key_points"));
        assert!(!prompt.contains("previous part"));
    }

    #[test]
    fn test_summary_prompt_marks_overlap_as_context() {
        let prompt = summary_prompt(&segment(1, "tail of part one"), 2);
        assert!(prompt.contains("do not summarize it"));
        let overlap_at = prompt.find("tail of part one").unwrap();
        let text_at = prompt.find("Patients were randomised").unwrap();
        assert!(overlap_at < text_at);
    }

    #[test]
    fn test_combine_prompt_keeps_order() {
        let first = PartialSummary {
            segment_index: 0,
            summary: "Background.".to_string(),
            key_points: vec![],
        };
        let third = PartialSummary {
            segment_index: 2,
            summary: "Results.".to_string(),
            key_points: vec![],
        };
        let prompt = combine_prompt(&[&first, &third], &["HR 0.74"]);

        assert!(prompt.starts_with("You are combining"));
        assert!(prompt.find("Part 1:").unwrap() < prompt.find("Part 3:").unwrap());
        assert!(prompt.contains("- HR 0.74"));
        assert!(!prompt.contains("Part 2:"));
    }

    #[test]
    fn test_facet_prompt_with_section() {
        let context = FacetContext {
            source: ContextSource::Section("methods".to_string()),
            text: "We enrolled 3731 adults.".to_string(),
        };
        let prompt = facet_prompt(spec(Facet::Design), &context, "An overview.");

        assert!(prompt.starts_with("Extraction task: design"));
        assert!(prompt.contains("methods section"));
        assert!(prompt.contains("We enrolled 3731 adults."));
        assert!(prompt.contains("Paper Overview:"));
        assert!(prompt.contains("\"population_size\""));
        assert!(prompt.contains("null"));
    }

    #[test]
    fn test_facet_prompt_overview_only() {
        let context = FacetContext {
            source: ContextSource::Overview,
            text: String::new(),
        };
        let prompt = facet_prompt(spec(Facet::SafetyEvents), &context, "An overview.");

        assert!(prompt.starts_with("Extraction task: safety_events"));
        assert!(!prompt.contains("Relevant"));
        assert!(prompt.contains("An overview."));
    }
}
