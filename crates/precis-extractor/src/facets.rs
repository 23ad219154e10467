//! The specialized extractor registry and context slicing
//!
//! Each [`Facet`] has one [`FacetSpec`]: what to ask for, the JSON template
//! the answer must follow, the retrieval query used to find supporting text
//! and the document section that usually holds it.

use crate::chunking::truncate_chars;
use crate::config::PipelineConfig;
use precis_domain::traits::ContextRetriever;
use precis_domain::{Document, Facet, Overview};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Static description of one specialized extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacetSpec {
    /// Facet this spec describes
    pub facet: Facet,

    /// Task instructions
    pub instructions: &'static str,

    /// JSON template the answer must follow
    pub schema: &'static str,

    /// Retrieval query for supporting context
    pub query: &'static str,

    /// Document section that usually holds the answer
    pub section: &'static str,
}

const METADATA: FacetSpec = FacetSpec {
    facet: Facet::Metadata,
    instructions: "Extract metadata from this clinical trial paper.\n\
1. title: The paper title (exact as written)\n\
2. trial_name: Trial acronym or name, if any\n\
3. authors: List of author names\n\
4. journal: Journal name (if mentioned)\n\
5. year: Publication year (as number)\n\
6. doi: DOI (as string, without URL)\n\
7. registry_number: Trial registration number (e.g. NCT number)\n\
8. study_type: One of RCT, observational, cohort, case-control, meta-analysis, other",
    schema: r#"{
  "title": "exact title",
  "trial_name": "ACRONYM",
  "authors": ["Author One", "Author Two"],
  "journal": "Journal Name",
  "year": 2023,
  "doi": "10.xxxx/xxxxx",
  "registry_number": "NCT00000000",
  "study_type": "RCT"
}"#,
    query: "title authors journal publication year doi trial registration study type",
    section: "abstract",
};

const BACKGROUND: FacetSpec = FacetSpec {
    facet: Facet::Background,
    instructions: "Extract the background of this clinical trial.\n\
1. background: The clinical context and rationale for the study (2-4 sentences)\n\
2. research_question: The question the trial set out to answer",
    schema: r#"{
  "background": "clinical context and rationale",
  "research_question": "what the trial asks"
}"#,
    query: "background rationale clinical context unmet need research question objective",
    section: "introduction",
};

const DESIGN: FacetSpec = FacetSpec {
    facet: Facet::Design,
    instructions: "Extract study design information.\n\
1. design_type: One of rct, crossover, cluster_randomized, non_randomized, cohort, case_control, cross_sectional, meta_analysis, other\n\
2. population_size: Total number of participants (as integer)\n\
3. intervention: Name/description of the intervention or treatment group\n\
4. comparator: Name/description of the comparison group\n\
5. follow_up: Follow-up period\n\
6. duration: Treatment duration\n\
7. primary_outcomes: List of primary outcomes measured (1-5 items)\n\
Be specific and use exact terminology from the paper.",
    schema: r#"{
  "design_type": "rct",
  "population_size": 3731,
  "intervention": "Semaglutide 1.0 mg weekly",
  "comparator": "Placebo",
  "follow_up": "104 weeks",
  "duration": "2 years",
  "primary_outcomes": ["Major adverse cardiovascular events"]
}"#,
    query: "patient population inclusion exclusion criteria intervention comparator outcomes follow-up duration sample size",
    section: "methods",
};

const RESULTS: FacetSpec = FacetSpec {
    facet: Facet::Results,
    instructions: "Extract key results and findings.\n\
1. main_finding: The primary result in one or two sentences, with numbers as stated\n\
2. key_results: Other important results (list of strings)\n\
3. adverse_events: Notable safety findings (list of strings)\n\
4. conclusions: The authors' conclusions (list of strings)\n\
Focus on actual results, not interpretation. Extract numbers as stated in the paper.",
    schema: r#"{
  "main_finding": "HR 0.74 (95% CI 0.58-0.95) for the primary outcome",
  "key_results": ["result 1", "result 2"],
  "adverse_events": ["event summary"],
  "conclusions": ["conclusion"]
}"#,
    query: "main results primary endpoint findings conclusions",
    section: "results",
};

const LIMITATIONS: FacetSpec = FacetSpec {
    facet: Facet::Limitations,
    instructions: "Extract limitations.\n\
1. limitations: Limitations acknowledged by the authors\n\
2. bias_risks: Sources of bias (selection, attrition, blinding, reporting)\n\
3. generalizability: Who the results do and do not apply to",
    schema: r#"{
  "limitations": [],
  "bias_risks": [],
  "generalizability": ""
}"#,
    query: "limitations biases missing data generalizability and threats to validity",
    section: "discussion",
};

const OUTCOMES: FacetSpec = FacetSpec {
    facet: Facet::Outcomes,
    instructions: "Extract outcome data from the trial results.\n\
For each outcome, extract:\n\
1. Outcome name/label\n\
2. Effect measure (hazard ratio, odds ratio, relative risk, mean difference, event rate, etc.)\n\
3. Numeric estimate\n\
4. Confidence interval (95% unless otherwise specified)\n\
5. P-value (if reported)\n\
6. Units\n\
7. Category: primary, secondary or exploratory\n\
Report every outcome you find; do not limit the list.",
    schema: r#"{
  "outcomes": [
    {
      "name": "...",
      "measure_type": "hazard_ratio|odds_ratio|relative_risk|mean_difference|event_rate|continuous|auc|cmax|other",
      "estimate": 0.0,
      "confidence_interval": {"lower": 0.0, "upper": 0.0, "level": 0.95},
      "p_value": 0.05,
      "units": "...",
      "definition": "...",
      "category": "primary",
      "is_primary": true
    }
  ]
}"#,
    query: "primary secondary outcomes effect estimates confidence intervals p-values results",
    section: "results",
};

const ARMS: FacetSpec = FacetSpec {
    facet: Facet::Arms,
    instructions: "Extract treatment arm allocation data.\n\
For each arm, extract:\n\
1. Arm label/name\n\
2. Total allocated\n\
3. Total analyzed\n\
4. Total completed\n\
5. Brief description of intervention\n\
Report every arm you find.",
    schema: r#"{
  "arms": [
    {
      "label": "...",
      "n_allocated": 0,
      "n_analyzed": 0,
      "n_completed": 0,
      "description": "..."
    }
  ]
}"#,
    query: "treatment arms allocation randomization enrollment sample size",
    section: "methods",
};

const SAFETY_EVENTS: FacetSpec = FacetSpec {
    facet: Facet::SafetyEvents,
    instructions: "Extract all reported adverse events and safety data.\n\
For each event, extract:\n\
1. Event name\n\
2. Event type (gastrointestinal, cardiovascular, laboratory, serious, discontinuation, etc.)\n\
3. Incidence in each arm (count and/or percentage), keyed by arm label\n\
4. Whether it led to discontinuation\n\
5. Whether it was a serious adverse event",
    schema: r#"{
  "safety_events": [
    {
      "event_name": "...",
      "event_type": "gastrointestinal|cardiovascular|laboratory|serious|discontinuation|other",
      "arm_data": {
        "arm_label": {"percent": 0.0, "count": 0}
      },
      "serious": false,
      "led_to_discontinuation": false,
      "notes": "..."
    }
  ]
}"#,
    query: "adverse events safety serious events discontinuations side effects gastrointestinal cardiovascular laboratory",
    section: "results",
};

/// Registry entry for a facet
pub fn spec(facet: Facet) -> &'static FacetSpec {
    match facet {
        Facet::Metadata => &METADATA,
        Facet::Background => &BACKGROUND,
        Facet::Design => &DESIGN,
        Facet::Results => &RESULTS,
        Facet::Limitations => &LIMITATIONS,
        Facet::Outcomes => &OUTCOMES,
        Facet::Arms => &ARMS,
        Facet::SafetyEvents => &SAFETY_EVENTS,
    }
}

/// Every registry entry, in registry order
pub fn registry() -> impl Iterator<Item = &'static FacetSpec> {
    Facet::ALL.into_iter().map(spec)
}

/// Where a facet's context came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "name", rename_all = "snake_case")]
pub enum ContextSource {
    /// A named section of the input document
    Section(String),
    /// Snippets returned by the retrieval collaborator
    Retrieval,
    /// The overview alone
    Overview,
}

/// Context chosen for one facet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetContext {
    /// Origin of the text
    pub source: ContextSource,
    /// Context text (empty when the overview alone is used)
    pub text: String,
}

impl FacetContext {
    fn overview_only() -> Self {
        Self {
            source: ContextSource::Overview,
            text: String::new(),
        }
    }
}

/// Pick the context for a facet: document section, then retrieval, then overview
pub async fn select_context(
    spec: &FacetSpec,
    document: &Document,
    retriever: &dyn ContextRetriever,
    config: &PipelineConfig,
) -> FacetContext {
    let usable = |text: &str| text.trim().len() >= config.min_context_chars;

    if let Some(section) = document.section(spec.section).filter(|s| usable(s)) {
        debug!(facet = %spec.facet, section = spec.section, "using document section");
        return FacetContext {
            source: ContextSource::Section(spec.section.to_string()),
            text: truncate_chars(section, config.max_context_chars).to_string(),
        };
    }

    let snippets: Vec<String> = retriever
        .get_context(spec.query, config.max_context_items)
        .await
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(config.max_context_items)
        .collect();
    let joined = snippets.join("\n\n");
    if usable(&joined) {
        debug!(facet = %spec.facet, snippets = snippets.len(), "using retrieved context");
        return FacetContext {
            source: ContextSource::Retrieval,
            text: truncate_chars(&joined, config.max_context_chars).to_string(),
        };
    }

    debug!(facet = %spec.facet, "using overview only");
    FacetContext::overview_only()
}

/// Overview text shown next to a facet context
pub fn overview_excerpt<'a>(overview: &'a Overview, config: &PipelineConfig) -> &'a str {
    truncate_chars(&overview.text, config.max_overview_chars)
}
