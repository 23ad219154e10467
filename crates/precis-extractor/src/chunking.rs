//! Document segmentation
//!
//! Segments cover the document exactly: concatenating `segment.text` in index
//! order reproduces the input byte for byte. Overlap is carried separately as
//! read-only context, so no text is ever counted twice.

use crate::config::ChunkStrategy;
use crate::error::PipelineError;
use precis_domain::Segment;

/// Splits a document into bounded, ordered segments
#[derive(Debug, Clone)]
pub struct Segmenter {
    strategy: ChunkStrategy,
    max_segment_chars: usize,
    overlap_chars: usize,
}

impl Segmenter {
    /// Create a new segmenter
    pub fn new(strategy: ChunkStrategy, max_segment_chars: usize, overlap_chars: usize) -> Self {
        Self {
            strategy,
            max_segment_chars: max_segment_chars.max(1),
            overlap_chars,
        }
    }

    /// Segment the given text
    pub fn segment(&self, text: &str) -> Result<Vec<Segment>, PipelineError> {
        if text.is_empty() {
            return Err(PipelineError::InvalidInput(
                "document text is empty".to_string(),
            ));
        }

        let mut segments: Vec<Segment> = Vec::new();
        let mut start = 0;

        while start < text.len() {
            let end = self.next_cut(text, start);
            let slice = &text[start..end];
            let overlap = segments
                .last()
                .map(|prev| tail(&prev.text, self.overlap_chars).to_string())
                .unwrap_or_default();

            segments.push(Segment {
                index: segments.len(),
                text: slice.to_string(),
                overlap,
                approx_tokens: slice.chars().count().div_ceil(4),
            });
            start = end;
        }

        Ok(segments)
    }

    /// End offset of the segment starting at `start`
    fn next_cut(&self, text: &str, start: usize) -> usize {
        if text.len() - start <= self.max_segment_chars {
            return text.len();
        }

        let hard = floor_char_boundary(text, start + self.max_segment_chars);
        if hard <= start {
            // A single character wider than the limit
            return ceil_char_boundary(text, start + 1);
        }

        let window = &text[start..hard];
        let min_cut = (window.len() / 2).max(1);

        let preferred = match self.strategy {
            ChunkStrategy::ByParagraph => paragraph_break(window, min_cut),
            ChunkStrategy::BySection => {
                section_break(text, start, window, min_cut).or_else(|| paragraph_break(window, min_cut))
            }
            ChunkStrategy::ByTokenCount => sentence_break(window, min_cut),
        };

        start + preferred
            .or_else(|| whitespace_break(window, min_cut))
            .unwrap_or(window.len())
    }
}

/// Cut after the last blank line at or beyond `min_cut`
fn paragraph_break(window: &str, min_cut: usize) -> Option<usize> {
    window
        .rmatch_indices("\n\n")
        .map(|(pos, _)| pos + 2)
        .find(|cut| *cut >= min_cut)
}

/// Cut before the last heading line (markdown `#` or `1.`-style numbering)
fn section_break(text: &str, start: usize, window: &str, min_cut: usize) -> Option<usize> {
    window
        .rmatch_indices('\n')
        .map(|(pos, _)| pos + 1)
        .filter(|cut| *cut >= min_cut && *cut < window.len())
        .find(|cut| is_heading(line_at(text, start + cut)))
}

/// Cut after the last sentence terminator followed by whitespace
fn sentence_break(window: &str, min_cut: usize) -> Option<usize> {
    let bytes = window.as_bytes();
    (1..bytes.len())
        .rev()
        .filter(|&i| matches!(bytes[i - 1], b'.' | b'!' | b'?') && bytes[i].is_ascii_whitespace())
        .map(|i| i + 1)
        .find(|cut| *cut >= min_cut)
}

/// Cut after the last ASCII whitespace
fn whitespace_break(window: &str, min_cut: usize) -> Option<usize> {
    window
        .bytes()
        .enumerate()
        .rev()
        .filter(|(_, b)| b.is_ascii_whitespace())
        .map(|(i, _)| i + 1)
        .find(|cut| *cut >= min_cut)
}

fn line_at(text: &str, offset: usize) -> &str {
    let rest = &text[offset..];
    rest.split('\n').next().unwrap_or(rest)
}

fn is_heading(line: &str) -> bool {
    let line = line.trim_start();
    if line.starts_with('#') {
        return true;
    }
    // "2. Methods", "3.1 Outcomes"
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && line[digits..].starts_with('.')
}

/// Last `max` bytes of `text`, starting on a char boundary
fn tail(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    &text[ceil_char_boundary(text, text.len() - max)..]
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

/// Truncate `text` to at most `max` bytes on a char boundary
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    &text[..floor_char_boundary(text, max)]
}
