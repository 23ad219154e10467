//! Precis Extractor
//!
//! Turns the text of a clinical trial paper into a typed [`TrialSummary`]
//! through a fixed sequence of generative calls.
//!
//! # Overview
//!
//! A single prompt over a whole paper either overflows the model's context or
//! loses detail. The pipeline instead summarizes bounded segments in parallel,
//! merges those summaries into one overview, and then asks a set of narrow,
//! specialized questions (metadata, design, outcomes, arms, safety, ...)
//! against that overview, again in parallel. Raw answers are typed by a lenient
//! mapper and checked by an advisory validator.
//!
//! # Architecture
//!
//! ```text
//! Document → Segmenter → Summarizer (fan-out) → Combiner → Overview
//!          → Extractors (fan-out) → Mapper → Validator → RunReport
//! ```
//!
//! # Key Features
//!
//! - **Ordered fan-out**: results are placed by segment index or facet, never
//!   by completion order
//! - **Failure as data**: a failed segment or facet becomes a recorded
//!   [`Failure`](precis_llm::Failure) and the run continues
//! - **Variable-length entities**: outcome, arm and safety lists take whatever
//!   length the paper has
//! - **Cancellation**: [`Orchestrator::run_with_cancel`] stops a run between
//!   or during stages
//!
//! # Example Usage
//!
//! ```no_run
//! use precis_extractor::{Orchestrator, PipelineConfig};
//! use precis_domain::Document;
//! use precis_llm::OllamaProvider;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = OllamaProvider::default_endpoint("llama3.1:8b");
//! let orchestrator = Orchestrator::new(provider, PipelineConfig::default())?;
//!
//! let text = std::fs::read_to_string("paper.txt")?;
//! let report = orchestrator.run(Document::new(text)).await?;
//!
//! println!("Title: {}", report.summary.metadata.title);
//! println!("Arms: {}", report.summary.arms.len());
//! println!("Issues: {}", report.issues.len());
//! println!("Defaulted: {:?}", report.failures.defaulted_facets());
//! # Ok(())
//! # }
//! ```
//!
//! [`TrialSummary`]: precis_domain::TrialSummary

#![warn(missing_docs)]

mod chunking;
mod combiner;
mod config;
mod error;
mod extraction;
mod facets;
mod mapper;
mod orchestrator;
mod prompt;
mod report;
mod run;
mod summarizer;


pub use chunking::Segmenter;
pub use combiner::{combine, Combined};
pub use config::{effective_concurrency, ChunkStrategy, PipelineConfig};
pub use error::PipelineError;
pub use extraction::extract_all;
pub use facets::{
    overview_excerpt, registry, select_context, spec as facet_spec, ContextSource, FacetContext,
    FacetSpec,
};
pub use mapper::{map_extractions, parse_number, Coerced, FromRaw, Mapped};
pub use orchestrator::Orchestrator;
pub use report::{FailureReport, RunMetadata, RunReport, SegmentFailure};
pub use run::{RunContext, RunState, Transition};
pub use summarizer::summarize_all;
