//! Stage 1 values: segments, partial summaries and the overview

use serde::{Deserialize, Serialize};

/// Ordered unit of document text
///
/// `text` is the segment's exclusive share of the document: concatenating the
/// `text` of all segments in index order reproduces the input exactly.
/// `overlap` is read-only context copied from the end of the previous segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Position in the document (0-based)
    pub index: usize,

    /// Exclusive slice of the document
    pub text: String,

    /// Trailing context from the previous segment (empty for index 0)
    pub overlap: String,

    /// Approximate token count of `text` (4 bytes ~ 1 token)
    pub approx_tokens: usize,
}

impl Segment {
    /// Text to show a model: overlap context followed by the segment itself
    pub fn prompt_text(&self) -> String {
        if self.overlap.is_empty() {
            self.text.clone()
        } else {
            format!("{}{}", self.overlap, self.text)
        }
    }
}

/// Per-segment summary produced by one generative call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialSummary {
    /// Index of the segment this summarizes
    pub segment_index: usize,

    /// Summary text
    pub summary: String,

    /// Key points listed by the model
    pub key_points: Vec<String>,
}

/// How the overview text was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverviewSource {
    /// Synthesized by a combine call
    Synthesized,

    /// Combine call failed; partial summaries joined in segment order
    Concatenated,
}

/// Document-level synthesis consumed by every extraction task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overview {
    /// Overview text (bounded length)
    pub text: String,

    /// Number of partial summaries that fed the overview
    pub partials_used: usize,

    /// How the text was produced
    pub source: OverviewSource,
}
