//! Input document and run identity

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

/// Unique identifier for one extraction run based on UUIDv7
///
/// UUIDv7 keeps run identifiers sortable by start time, which makes log
/// correlation across concurrent runs straightforward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct RunId(u128);

impl RunId {
    /// Generate a new UUIDv7-based RunId
    ///
    /// # Examples
    ///
    /// ```
    /// use precis_domain::RunId;
    ///
    /// let id = RunId::new();
    /// assert!(id.value() > 0);
    /// ```
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().as_u128())
    }

    /// Parse a RunId from its string form
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s)
            .map(|u| Self(u.as_u128()))
            .map_err(|e| format!("Invalid run id: {}", e))
    }

    /// Get the raw u128 value
    pub fn value(&self) -> u128 {
        self.0
    }

    /// Milliseconds since the Unix epoch at which the run id was minted
    pub fn timestamp_ms(&self) -> u64 {
        // UUIDv7: top 48 bits are the Unix millisecond timestamp
        (self.0 >> 80) as u64
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.0))
    }
}

impl From<RunId> for String {
    fn from(id: RunId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for RunId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_string(&s)
    }
}

/// Raw document text handed over by the ingestion collaborator
///
/// `sections` optionally maps a lower-case section name ("methods",
/// "results", ...) to a byte range of `text`. The pipeline treats the map as a
/// hint: a run behaves correctly when it is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Full extracted text
    pub text: String,

    /// Optional named section ranges (byte offsets into `text`)
    #[serde(default)]
    pub sections: BTreeMap<String, Range<usize>>,
}

impl Document {
    /// Create a document with no section map
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sections: BTreeMap::new(),
        }
    }

    /// Attach a named section range
    pub fn with_section(mut self, name: impl Into<String>, range: Range<usize>) -> Self {
        self.sections.insert(name.into().to_lowercase(), range);
        self
    }

    /// Text of a named section, if the map has it and the range is usable
    ///
    /// Ranges that fall outside the text or split a UTF-8 character yield
    /// `None` rather than panicking.
    pub fn section(&self, name: &str) -> Option<&str> {
        let range = self.sections.get(&name.to_lowercase())?;
        self.text.get(range.clone()).map(str::trim)
    }
}
