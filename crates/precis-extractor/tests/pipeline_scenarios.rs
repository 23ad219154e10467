//! End-to-end runs of the extraction pipeline against scripted providers
//!
//! Every test drives [`Orchestrator`] through a [`MockProvider`] whose rules
//! key on the fixed markers the prompts carry: `Part i/N` for segment
//! summaries, `You are combining` for the overview and `Extraction task: <facet>`
//! for the specialized extractors.

use precis_domain::traits::StaticRetriever;
use precis_domain::{DesignType, Document, Facet, MeasureKind, OverviewSource};
use precis_extractor::{Orchestrator, PipelineConfig, PipelineError, RunState};
use precis_llm::{FailureKind, LlmError, MockProvider, RetryPolicy};
use precis_validator::{IssueKind, Severity};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const SUMMARY_REPLY: &str =
    r#"{"summary": "Participants were followed for events.", "key_points": ["events were counted"]}"#;

const OVERVIEW_REPLY: &str =
    "Adults with type 2 diabetes were randomised to drug or placebo and followed for cardiovascular events.";

/// Route log output to the test harness when RUST_LOG is set
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Ten paragraphs that segment into exactly ten parts
fn ten_part_paper() -> Document {
    let text = (0..10)
        .map(|i| format!("Paragraph {:02} reports trial findings.", i))
        .collect::<Vec<_>>()
        .join("\n\n");
    Document::new(text)
}

fn config() -> PipelineConfig {
    PipelineConfig {
        max_segment_chars: 64,
        segment_overlap_chars: 8,
        retry: RetryPolicy::immediate(3),
        ..PipelineConfig::default()
    }
}

/// Provider with test-specific rules first, then the standard replies
fn provider(setup: impl FnOnce(&mut MockProvider)) -> MockProvider {
    let mut provider = MockProvider::new(SUMMARY_REPLY);
    setup(&mut provider);
    provider.add_response("You are combining", OVERVIEW_REPLY);
    provider.add_response("Extraction task:", "{}");
    provider
}

fn orchestrator(provider: &MockProvider) -> Orchestrator<MockProvider> {
    Orchestrator::new(provider.clone(), config()).unwrap()
}

#[tokio::test]
async fn test_complete_run_produces_typed_summary() {
    init_tracing();
    let provider = provider(|p| {
        p.add_response(
            "Extraction task: metadata",
            r#"{"title": "Drug X in Type 2 Diabetes", "year": "2021", "doi": "https://doi.org/10.1000/xyz"}"#,
        );
        p.add_response(
            "Extraction task: design",
            r#"{"design_type": "randomized controlled trial", "population_size": "1,200", "intervention": "Drug X"}"#,
        );
        p.add_response(
            "Extraction task: outcomes",
            r#"{"outcomes": [{"name": "MACE", "measure_type": "hazard ratio", "estimate": 0.82,
                "confidence_interval": {"lower": 0.71, "upper": 0.95, "level": 0.95},
                "p_value": "p = 0.004", "category": "primary"}]}"#,
        );
        p.add_response(
            "Extraction task: arms",
            r#"{"arms": [{"label": "Drug X", "n_allocated": 600, "n_analyzed": 598},
                         {"label": "Placebo", "n_allocated": 600, "n_analyzed": 597}]}"#,
        );
        p.add_response(
            "Extraction task: safety_events",
            r#"{"safety_events": [{"event_name": "Hypoglycaemia", "serious": false,
                "incidence": {"Drug X": {"count": 12, "percent": 2.0}, "Placebo": {"count": 6, "percent": 1.0}}}]}"#,
        );
    });

    let report = orchestrator(&provider).run(ten_part_paper()).await.unwrap();

    let summary = &report.summary;
    assert_eq!(summary.metadata.title, "Drug X in Type 2 Diabetes");
    assert_eq!(summary.metadata.year, Some(2021));
    assert_eq!(summary.metadata.doi.as_deref(), Some("10.1000/xyz"));
    assert_eq!(summary.design.design_type, DesignType::RandomizedControlled);
    assert_eq!(summary.design.population_size, Some(1200));

    assert_eq!(summary.outcomes.primary.len(), 1);
    let mace = &summary.outcomes.primary[0];
    assert_eq!(mace.measure, MeasureKind::HazardRatio);
    assert_eq!(mace.estimate, Some(0.82));
    assert_eq!(mace.p_value, Some(0.004));
    assert_eq!(mace.confidence_interval.as_ref().unwrap().upper, Some(0.95));

    assert_eq!(summary.arms.len(), 2);
    assert_eq!(summary.safety_events.len(), 1);
    assert!(report.issues.iter().all(|issue| issue.severity != Severity::Error));

    assert!(report.failures.is_clean());
    assert!(!report.is_partial());
    assert_eq!(report.metadata.segments, 10);
    assert_eq!(report.metadata.partials_used, 10);
    assert_eq!(report.metadata.model, "mock");
    assert_eq!(report.overview.source, OverviewSource::Synthesized);
    assert_eq!(report.overview.text, OVERVIEW_REPLY);
}

#[tokio::test]
async fn test_failed_segment_is_left_out_of_overview() {
    init_tracing();
    let provider = provider(|p| {
        p.add_error("Part 4/10", LlmError::ModelNotAvailable("unloaded".into()));
    });

    let report = orchestrator(&provider).run(ten_part_paper()).await.unwrap();

    assert_eq!(report.failures.segment_failures.len(), 1);
    let failed = &report.failures.segment_failures[0];
    assert_eq!(failed.index, 3);
    assert_eq!(failed.failure.kind, FailureKind::Permanent);

    assert_eq!(report.metadata.partials_used, 9);
    assert_eq!(report.overview.source, OverviewSource::Synthesized);

    let combine = provider
        .prompts()
        .into_iter()
        .find(|p| p.starts_with("You are combining"))
        .unwrap();
    assert!(combine.contains("Part 3:"));
    assert!(!combine.contains("Part 4:"));
    assert!(combine.contains("Part 5:"));
}

#[tokio::test]
async fn test_all_segments_failing_ends_run() {
    init_tracing();
    let provider = MockProvider::new("I am not able to summarize this.");

    let result = orchestrator(&provider).run(ten_part_paper()).await;

    assert_eq!(result.unwrap_err(), PipelineError::NoUsablePartials { segments: 10 });
    assert_eq!(provider.calls_matching("You are combining"), 0);
    assert_eq!(provider.calls_matching("Extraction task"), 0);
    // every segment used its full retry budget
    assert_eq!(provider.call_count(), 30);
}

#[tokio::test]
async fn test_impossible_p_value_is_kept_and_flagged() {
    init_tracing();
    let provider = provider(|p| {
        p.add_response("Extraction task: outcomes", r#"{"p_value": 1.5}"#);
    });

    let report = orchestrator(&provider).run(ten_part_paper()).await.unwrap();

    let outcomes = &report.summary.outcomes;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes.secondary[0].p_value, Some(1.5));

    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].kind, IssueKind::OutOfRange);
    assert_eq!(report.issues[0].severity, Severity::Error);

    // the bare object was read as a one-element list
    assert_eq!(report.notes.len(), 1);
    assert_eq!(report.notes[0].facet, Facet::Outcomes);
    assert_eq!(report.advisories.len(), 1);
    assert_eq!(report.advisories[0].kind, IssueKind::Coercion);
}

#[tokio::test]
async fn test_arm_list_takes_paper_length() {
    init_tracing();
    let provider = provider(|p| {
        p.add_response(
            "Extraction task: arms",
            r#"{"arms": [
                {"label": "Placebo", "n_allocated": 100},
                {"label": "Drug 5 mg", "n_allocated": 100},
                {"label": "Drug 10 mg", "n_allocated": 100},
                {"label": "Drug 20 mg", "n_allocated": 100},
                {"label": "Active comparator", "n_allocated": 100}
            ]}"#,
        );
    });

    let report = orchestrator(&provider).run(ten_part_paper()).await.unwrap();

    let labels: Vec<&str> = report.summary.arms.iter().map(|a| a.label.as_str()).collect();
    assert_eq!(
        labels,
        ["Placebo", "Drug 5 mg", "Drug 10 mg", "Drug 20 mg", "Active comparator"]
    );
    assert!(report.notes.is_empty());
    assert!(report.issues.is_empty());
}

#[tokio::test]
async fn test_failed_facet_is_defaulted_and_recorded() {
    init_tracing();
    let provider = provider(|p| {
        p.add_error("Extraction task: safety_events", LlmError::ModelNotAvailable("unloaded".into()));
        p.add_response("Extraction task: metadata", r#"{"title": "Still here"}"#);
    });

    let report = orchestrator(&provider).run(ten_part_paper()).await.unwrap();

    assert!(report.is_partial());
    assert_eq!(report.failures.defaulted_facets(), vec![Facet::SafetyEvents]);
    assert!(report.summary.safety_events.is_empty());
    assert_eq!(report.summary.metadata.title, "Still here");
}

#[tokio::test]
async fn test_combine_failure_falls_back_to_concatenation() {
    init_tracing();
    let provider = provider(|p| {
        p.add_error("You are combining", LlmError::ModelNotAvailable("unloaded".into()));
    });

    let report = orchestrator(&provider).run(ten_part_paper()).await.unwrap();

    assert_eq!(report.overview.source, OverviewSource::Concatenated);
    assert!(report.overview.text.starts_with("Part 1:\n"));
    assert!(report.failures.overview_fallback.is_some());
    assert_eq!(provider.calls_matching("Extraction task:"), Facet::ALL.len());
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    init_tracing();
    let provider = provider(|p| {
        p.add_failures("Extraction task: design", 2, LlmError::RateLimitExceeded);
        p.add_response("Extraction task: design", r#"{"design_type": "rct", "population_size": 3731}"#);
    });

    let report = orchestrator(&provider).run(ten_part_paper()).await.unwrap();

    assert_eq!(report.summary.design.population_size, Some(3731));
    assert_eq!(provider.calls_matching("Extraction task: design"), 3);
    assert!(report.failures.is_clean());
}

#[tokio::test]
async fn test_unparseable_reply_gets_a_corrective_prompt() {
    init_tracing();
    let provider = provider(|p| {
        p.add_responses_once("Extraction task: arms", 1, "Sorry, there are two arms.");
        p.add_response("Extraction task: arms", r#"{"arms": [{"label": "A"}, {"label": "B"}]}"#);
    });

    let report = orchestrator(&provider).run(ten_part_paper()).await.unwrap();

    assert_eq!(report.summary.arms.len(), 2);
    let arm_prompts: Vec<String> = provider
        .prompts()
        .into_iter()
        .filter(|p| p.starts_with("Extraction task: arms"))
        .collect();
    assert_eq!(arm_prompts.len(), 2);
    assert!(arm_prompts[1].contains("valid JSON"));
}

#[tokio::test]
async fn test_overview_reflects_segment_order_despite_latency() {
    init_tracing();
    let provider = provider(|p| {
        for i in 1..=10u64 {
            let marker = format!("Part {}/10", i);
            p.add_latency(marker.clone(), Duration::from_millis((i * 37 % 10) * 5));
            p.add_response(
                marker,
                format!(r#"{{"summary": "Summary number {}.", "key_points": []}}"#, i),
            );
        }
    });

    orchestrator(&provider).run(ten_part_paper()).await.unwrap();

    let combine = provider
        .prompts()
        .into_iter()
        .find(|p| p.starts_with("You are combining"))
        .unwrap();
    let positions: Vec<usize> = (1..=10)
        .map(|i| combine.find(&format!("Summary number {}.", i)).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_transitions_follow_stage_order() {
    init_tracing();
    let provider = provider(|_| {});

    let report = orchestrator(&provider).run(ten_part_paper()).await.unwrap();

    let states: Vec<RunState> = report.transitions.iter().map(|t| t.state).collect();
    assert_eq!(
        states,
        vec![
            RunState::Segmenting,
            RunState::Summarizing,
            RunState::Combining,
            RunState::Extracting,
            RunState::Mapping,
            RunState::Validating,
            RunState::Done,
        ]
    );
    assert!(report.transitions.windows(2).all(|w| w[0].at_ms <= w[1].at_ms));
}

#[tokio::test]
async fn test_retriever_context_reaches_extractors() {
    init_tracing();
    let provider = provider(|_| {});
    let snippet = "Results: the primary outcome occurred in 6.6% of the drug group and 8.9% of the placebo group.";
    let orchestrator =
        orchestrator(&provider).with_retriever(Arc::new(StaticRetriever::new(vec![snippet.to_string()])));

    orchestrator.run(ten_part_paper()).await.unwrap();

    let with_excerpts = provider
        .prompts()
        .iter()
        .filter(|p| p.starts_with("Extraction task:") && p.contains("Relevant excerpts"))
        .count();
    assert_eq!(with_excerpts, Facet::ALL.len());
}

#[tokio::test]
async fn test_pre_cancelled_run_makes_no_calls() {
    let provider = provider(|_| {});
    let token = CancellationToken::new();
    token.cancel();

    let result = orchestrator(&provider).run_with_cancel(ten_part_paper(), token).await;

    assert_eq!(result.unwrap_err(), PipelineError::Cancelled);
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_cancellation_stops_in_flight_calls() {
    init_tracing();
    let provider = provider(|p| {
        p.add_latency("Part", Duration::from_secs(30));
    });
    let config = PipelineConfig {
        retry: RetryPolicy {
            call_timeout_ms: 60_000,
            ..RetryPolicy::immediate(1)
        },
        ..config()
    };
    let orchestrator = Orchestrator::new(provider.clone(), config).unwrap();

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        orchestrator.run_with_cancel(ten_part_paper(), token),
    )
    .await
    .expect("cancellation should end the run promptly");

    assert_eq!(result.unwrap_err(), PipelineError::Cancelled);
    assert_eq!(provider.calls_matching("You are combining"), 0);
}

#[tokio::test]
async fn test_empty_document_is_rejected() {
    let provider = provider(|_| {});

    let result = orchestrator(&provider).run(Document::new("")).await;

    assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_whitespace_document_still_runs() {
    let provider = provider(|_| {});

    let report = orchestrator(&provider).run(Document::new("  \n\n ")).await.unwrap();

    assert_eq!(report.metadata.segments, 1);
    assert_eq!(provider.calls_matching("Part 1/1"), 1);
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let config = PipelineConfig {
        max_summary_concurrency: 0,
        ..PipelineConfig::default()
    };

    let result = Orchestrator::new(MockProvider::default(), config);

    assert!(matches!(result, Err(PipelineError::Config(_))));
}

#[tokio::test]
async fn test_report_serializes_to_json() {
    let provider = provider(|p| {
        p.add_error("Extraction task: arms", LlmError::ModelNotAvailable("unloaded".into()));
    });

    let report = orchestrator(&provider).run(ten_part_paper()).await.unwrap();
    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

    assert_eq!(json["failures"]["facet_failures"]["arms"]["kind"], "permanent");
    assert_eq!(json["metadata"]["segments"], 10);
    assert_eq!(json["transitions"].as_array().unwrap().len(), 7);
}

/// Needs a local Ollama server with the model pulled
#[tokio::test]
#[ignore]
async fn test_ollama_end_to_end() {
    init_tracing();
    let provider = precis_llm::OllamaProvider::default_endpoint("llama3.1:8b");
    let orchestrator = Orchestrator::new(provider, PipelineConfig::default()).unwrap();
    let text = "We randomly assigned 1200 adults with type 2 diabetes to Drug X (600) or placebo (600). \
                The primary outcome occurred in 6.6% and 8.9% of patients respectively \
                (hazard ratio, 0.82; 95% CI, 0.71 to 0.95; P=0.004).";

    let report = orchestrator.run(Document::new(text)).await.unwrap();

    assert_eq!(report.metadata.segments, 1);
    assert!(!report.overview.text.is_empty());
}
