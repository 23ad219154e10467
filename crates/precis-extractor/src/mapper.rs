//! Typing raw extraction output
//!
//! Extractors answer in loosely shaped JSON: numbers arrive as strings, lists
//! arrive as single objects, keys drift between aliases. The mapper accepts all
//! of it, converts what it can and records a [`MappingNote`] for every value it
//! had to convert or drop. Values are never range-checked here; a p-value of
//! 1.5 is carried through unchanged for the validator to flag.

use crate::chunking::truncate_chars;
use precis_domain::{
    Arm, Background, ConfidenceInterval, DesignType, Facet, Incidence, Limitations, MappingNote,
    MeasureKind, NoteAction, Outcome, OutcomePartition, OutcomeSet, ResultsSummary,
    SafetyEvent, StudyDesign, TrialMetadata, TrialSummary,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const ROOT: &str = "$";
const DETAIL_CHARS: usize = 120;

const PLACEHOLDERS: &[&str] = &[
    "",
    "n/a",
    "na",
    "nr",
    "none",
    "null",
    "nil",
    "unknown",
    "not reported",
    "not stated",
    "not available",
    "not applicable",
    "-",
    "--",
    "...",
    "…",
];

/// Outcome of converting one raw value
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced<T> {
    /// Value already had the expected type
    Native(T),

    /// Value was converted from another representation
    Converted(T),

    /// Value was present but could not be converted
    Invalid,

    /// Null or a placeholder such as "n/a"
    Missing,
}

impl<T> Coerced<T> {
    /// The converted value, if any
    pub fn value(self) -> Option<T> {
        match self {
            Coerced::Native(v) | Coerced::Converted(v) => Some(v),
            Coerced::Invalid | Coerced::Missing => None,
        }
    }
}

/// Lenient conversion from extractor JSON
pub trait FromRaw: Sized {
    /// Convert a raw value
    fn from_raw(value: &Value) -> Coerced<Self>;
}

impl FromRaw for f64 {
    fn from_raw(value: &Value) -> Coerced<Self> {
        match value {
            Value::Null => Coerced::Missing,
            Value::Number(n) => n.as_f64().map_or(Coerced::Invalid, Coerced::Native),
            Value::String(s) if is_placeholder(s) => Coerced::Missing,
            Value::String(s) => parse_number(s).map_or(Coerced::Invalid, Coerced::Converted),
            _ => Coerced::Invalid,
        }
    }
}

impl FromRaw for i64 {
    fn from_raw(value: &Value) -> Coerced<Self> {
        match value {
            Value::Null => Coerced::Missing,
            Value::Number(n) => match n.as_i64() {
                Some(i) => Coerced::Native(i),
                None => n
                    .as_f64()
                    .and_then(integral)
                    .map_or(Coerced::Invalid, Coerced::Converted),
            },
            Value::String(s) if is_placeholder(s) => Coerced::Missing,
            Value::String(s) => parse_number(s)
                .and_then(integral)
                .map_or(Coerced::Invalid, Coerced::Converted),
            _ => Coerced::Invalid,
        }
    }
}

impl FromRaw for bool {
    fn from_raw(value: &Value) -> Coerced<Self> {
        match value {
            Value::Null => Coerced::Missing,
            Value::Bool(b) => Coerced::Native(*b),
            Value::Number(n) => match n.as_f64() {
                Some(v) if v == 0.0 => Coerced::Converted(false),
                Some(v) if v == 1.0 => Coerced::Converted(true),
                _ => Coerced::Invalid,
            },
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "y" => Coerced::Converted(true),
                "false" | "no" | "n" => Coerced::Converted(false),
                other if is_placeholder(other) => Coerced::Missing,
                _ => Coerced::Invalid,
            },
            _ => Coerced::Invalid,
        }
    }
}

impl FromRaw for String {
    fn from_raw(value: &Value) -> Coerced<Self> {
        match value {
            Value::Null => Coerced::Missing,
            Value::String(s) if is_placeholder(s) => Coerced::Missing,
            Value::String(s) => Coerced::Native(s.trim().to_string()),
            Value::Number(n) => Coerced::Converted(n.to_string()),
            Value::Bool(b) => Coerced::Converted(b.to_string()),
            Value::Array(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .filter_map(|item| String::from_raw(item).value())
                    .collect();
                if parts.is_empty() {
                    Coerced::Missing
                } else {
                    Coerced::Converted(parts.join("; "))
                }
            }
            Value::Object(_) => Coerced::Invalid,
        }
    }
}

impl FromRaw for Vec<String> {
    fn from_raw(value: &Value) -> Coerced<Self> {
        match value {
            Value::Null => Coerced::Missing,
            Value::Array(items) => {
                let all_strings = items.iter().all(Value::is_string);
                let list: Vec<String> = items
                    .iter()
                    .filter_map(|item| String::from_raw(item).value())
                    .collect();
                if all_strings && list.len() == items.len() {
                    Coerced::Native(list)
                } else {
                    Coerced::Converted(list)
                }
            }
            Value::String(s) if is_placeholder(s) => Coerced::Missing,
            Value::String(s) => Coerced::Converted(vec![s.trim().to_string()]),
            _ => Coerced::Invalid,
        }
    }
}

fn is_placeholder(s: &str) -> bool {
    let s = s.trim();
    PLACEHOLDERS.iter().any(|p| s.eq_ignore_ascii_case(p))
}

fn integral(v: f64) -> Option<i64> {
    (v.is_finite() && v.fract() == 0.0 && v.abs() < 9.0e15).then_some(v as i64)
}

/// Parse a number the way papers write them
///
/// Accepts thousands separators ("3,731"), a trailing percent sign, a leading
/// comparator ("<0.001", "p = 0.03") and trailing prose ("0.74 (95% CI ...)").
/// A decimal comma ("0,05") is rejected rather than misread.
pub fn parse_number(raw: &str) -> Option<f64> {
    let normalized = raw.trim().replace('\u{2212}', "-");
    let mut rest = normalized.as_str();

    if let Some(after_p) = rest.strip_prefix(['p', 'P']) {
        let after_p = after_p.trim_start();
        if after_p.starts_with(['<', '>', '=', '≤', '≥']) {
            rest = after_p;
        }
    }
    rest = rest
        .trim_start_matches(['<', '>', '=', '≤', '≥', '~', '≈'])
        .trim_start();

    let token = number_token(rest)?;
    let after = &rest[token.len()..];
    let mut tail = after.chars();
    match (tail.next(), tail.next()) {
        (Some(c), _) if c.is_ascii_digit() => return None,
        (Some(',' | '.'), Some(d)) if d.is_ascii_digit() => return None,
        _ => {}
    }

    token.replace(',', "").parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Leading numeric token: optional sign, digits with optional 3-digit groups,
/// optional fraction
fn number_token(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'-' | b'+')) {
        end = 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let first_group = end - int_start;
    let mut grouped = false;
    while bytes.get(end) == Some(&b',')
        && bytes.get(end + 1..end + 4).is_some_and(|g| g.iter().all(u8::is_ascii_digit))
        && !bytes.get(end + 4).is_some_and(u8::is_ascii_digit)
    {
        grouped = true;
        end += 4;
    }
    if grouped && !(1..=3).contains(&first_group) {
        return None;
    }

    let mut digits = end - int_start;
    if bytes.get(end) == Some(&b'.') && bytes.get(end + 1).is_some_and(u8::is_ascii_digit) {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
            digits += 1;
        }
    }

    (digits > 0).then(|| &s[..end])
}

/// Every number in a string, with whether it carries a percent sign
///
/// A hyphen right after a digit is a range separator, not a sign.
fn scan_numbers(text: &str) -> Vec<(f64, bool)> {
    let chars: Vec<char> = text.replace('\u{2212}', "-").chars().collect();
    let digit_at = |i: usize| chars.get(i).is_some_and(|c| c.is_ascii_digit());
    let mut found = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let signed = c == '-'
            && (digit_at(i + 1) || (chars.get(i + 1) == Some(&'.') && digit_at(i + 2)))
            && (i == 0 || !chars[i - 1].is_ascii_digit());
        let starts = c.is_ascii_digit() || signed || (c == '.' && digit_at(i + 1));
        if !starts {
            i += 1;
            continue;
        }

        let start = i;
        i += 1;
        while i < chars.len() && (chars[i].is_ascii_digit() || (chars[i] == '.' && digit_at(i + 1))) {
            i += 1;
        }
        let token: String = chars[start..i].iter().collect();
        if let Ok(value) = token.parse::<f64>() {
            found.push((value, chars.get(i) == Some(&'%')));
        }
    }
    found
}

/// Read "0.58-0.95", "0.58 to 0.95", "(0.58, 0.95)" or "95% CI 0.58-0.95"
fn parse_interval_text(text: &str) -> Option<ConfidenceInterval> {
    let numbers = scan_numbers(text);
    let (level, bounds) = match numbers.as_slice() {
        [(level, true), rest @ ..] => (Some(*level), rest),
        all => (None, all),
    };
    match bounds {
        [(lower, false), (upper, false)] => Some(ConfidenceInterval {
            lower: Some(*lower),
            upper: Some(*upper),
            level,
        }),
        _ => None,
    }
}

fn strip_doi(doi: String) -> String {
    let lower = doi.to_lowercase();
    for prefix in ["https://doi.org/", "http://doi.org/", "https://dx.doi.org/", "http://dx.doi.org/", "doi:"] {
        if lower.starts_with(prefix) {
            return doi[prefix.len()..].trim().to_string();
        }
    }
    doi
}

fn join_path(base: &str, key: &str) -> String {
    if base.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", base, key)
    }
}

fn describe(value: &Value) -> String {
    truncate_chars(&value.to_string(), DETAIL_CHARS).to_string()
}

fn first_present<'v>(obj: &'v Map<String, Value>, keys: &[&'static str]) -> Option<(&'static str, &'v Value)> {
    keys.iter()
        .find_map(|key| obj.get(*key).filter(|v| !v.is_null()).map(|v| (*key, v)))
}

/// Typed summary plus every coercion decision taken to build it
#[derive(Debug, Clone, PartialEq)]
pub struct Mapped {
    /// The aggregate result
    pub summary: TrialSummary,

    /// Conversions and drops, in mapping order
    pub notes: Vec<MappingNote>,
}

/// Field reader for one facet's output that records what it converts
struct Fields<'n> {
    facet: Facet,
    notes: &'n mut Vec<MappingNote>,
}

impl Fields<'_> {
    fn note(&mut self, path: impl Into<String>, action: NoteAction, detail: impl Into<String>) {
        self.notes.push(MappingNote {
            facet: self.facet,
            path: path.into(),
            action,
            detail: detail.into(),
        });
    }

    /// Read the first non-null alias of a field
    fn read<T: FromRaw>(&mut self, obj: &Map<String, Value>, base: &str, keys: &[&'static str]) -> Option<T> {
        let (key, value) = first_present(obj, keys)?;
        match T::from_raw(value) {
            Coerced::Native(v) => Some(v),
            Coerced::Converted(v) => {
                self.note(join_path(base, key), NoteAction::Coerced, format!("converted {}", describe(value)));
                Some(v)
            }
            Coerced::Invalid => {
                self.note(join_path(base, key), NoteAction::Dropped, format!("unusable value {}", describe(value)));
                None
            }
            Coerced::Missing => None,
        }
    }

    /// The object holding a single-record facet's fields
    fn object<'v>(&mut self, value: &'v Value) -> Option<&'v Map<String, Value>> {
        match value {
            Value::Object(map) => match map.get(self.facet.as_str()) {
                Some(Value::Object(inner)) => Some(inner),
                _ => Some(map),
            },
            Value::Array(items) => {
                let first = items.iter().find_map(Value::as_object);
                if first.is_some() {
                    self.note(ROOT, NoteAction::Coerced, "list reply, first object used");
                } else if !items.is_empty() {
                    self.note(ROOT, NoteAction::Dropped, format!("expected an object, got {}", describe(value)));
                }
                first
            }
            Value::Null => None,
            other => {
                self.note(ROOT, NoteAction::Dropped, format!("expected an object, got {}", describe(other)));
                None
            }
        }
    }

    /// The elements of a list facet, with their position in the raw list
    ///
    /// Accepts a top-level list, a list under the facet key, a single object
    /// under the facet key, a lone list under some other key, or a bare object
    /// standing for one element. Non-object elements are skipped.
    fn elements<'v>(&mut self, value: &'v Value) -> Vec<(usize, &'v Map<String, Value>)> {
        let key = self.facet.as_str();
        let (items, list_path): (Vec<&'v Value>, String) = match value {
            Value::Array(items) => (items.iter().collect(), key.to_string()),
            Value::Object(map) => match map.get(key) {
                Some(Value::Array(items)) => (items.iter().collect(), key.to_string()),
                Some(single @ Value::Object(_)) => {
                    self.note(key, NoteAction::Coerced, "single object read as a one-element list");
                    (vec![single], key.to_string())
                }
                Some(Value::Null) => (Vec::new(), key.to_string()),
                Some(other) => {
                    self.note(key, NoteAction::Dropped, format!("expected a list, got {}", describe(other)));
                    (Vec::new(), key.to_string())
                }
                None => match lone_list(map) {
                    Some((other_key, items)) => {
                        self.note(other_key.as_str(), NoteAction::Coerced, format!("list read from '{}'", other_key));
                        (items.iter().collect(), other_key.clone())
                    }
                    None if map.is_empty() => (Vec::new(), key.to_string()),
                    None => {
                        self.note(ROOT, NoteAction::Coerced, "bare object read as a one-element list");
                        (vec![value], key.to_string())
                    }
                },
            },
            Value::Null => (Vec::new(), key.to_string()),
            other => {
                self.note(ROOT, NoteAction::Dropped, format!("expected a list, got {}", describe(other)));
                (Vec::new(), key.to_string())
            }
        };

        let mut elements = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            match item.as_object() {
                Some(map) => elements.push((index, map)),
                None => self.note(
                    format!("{}[{}]", list_path, index),
                    NoteAction::SkippedElement,
                    format!("expected an object, got {}", describe(item)),
                ),
            }
        }
        elements
    }

    /// Read a label and classify it, noting labels that match nothing
    fn classify<T>(
        &mut self,
        obj: &Map<String, Value>,
        base: &str,
        keys: &[&'static str],
        parse: impl Fn(&str) -> T,
        is_known: impl Fn(&T) -> bool,
    ) -> Option<T> {
        let label: String = self.read(obj, base, keys)?;
        let kind = parse(&label);
        if !is_known(&kind) {
            let key = first_present(obj, keys).map_or(keys[0], |(key, _)| key);
            self.note(join_path(base, key), NoteAction::Unclassified, label);
        }
        Some(kind)
    }

    fn partition(&mut self, obj: &Map<String, Value>, base: &str) -> OutcomePartition {
        if let Some(label) = self.read::<String>(obj, base, &["category", "partition", "outcome_type"]) {
            match OutcomePartition::parse(&label) {
                Some(partition) => return partition,
                None => self.note(
                    join_path(base, "category"),
                    NoteAction::Dropped,
                    format!("unknown category '{}'", label),
                ),
            }
        }
        match self.read::<bool>(obj, base, &["is_primary", "primary"]) {
            Some(true) => OutcomePartition::Primary,
            _ => OutcomePartition::Secondary,
        }
    }

    fn interval(&mut self, obj: &Map<String, Value>, base: &str) -> Option<ConfidenceInterval> {
        let mut ci = match first_present(obj, &["confidence_interval", "ci", "ci_95", "95_ci"]) {
            Some((key, value)) => self.interval_value(value, &join_path(base, key))?,
            None => {
                let lower = self.read(obj, base, &["ci_lower", "lower_ci", "lower"]);
                let upper = self.read(obj, base, &["ci_upper", "upper_ci", "upper"]);
                if lower.is_none() && upper.is_none() {
                    return None;
                }
                ConfidenceInterval {
                    lower,
                    upper,
                    level: self.read(obj, base, &["ci_level", "confidence_level"]),
                }
            }
        };
        ci.level = self.level(ci.level, &join_path(base, "confidence_interval.level"));
        Some(ci)
    }

    fn interval_value(&mut self, value: &Value, path: &str) -> Option<ConfidenceInterval> {
        match value {
            Value::Object(map) => {
                let ci = ConfidenceInterval {
                    lower: self.read(map, path, &["lower", "low", "lower_bound", "lcl"]),
                    upper: self.read(map, path, &["upper", "high", "upper_bound", "ucl"]),
                    level: self.read(map, path, &["level", "confidence_level"]),
                };
                (ci != ConfidenceInterval::default()).then_some(ci)
            }
            Value::Array(items) => match items.as_slice() {
                [lower, upper] => match (f64::from_raw(lower).value(), f64::from_raw(upper).value()) {
                    (Some(lower), Some(upper)) => {
                        self.note(path, NoteAction::Coerced, format!("converted {}", describe(value)));
                        Some(ConfidenceInterval {
                            lower: Some(lower),
                            upper: Some(upper),
                            level: None,
                        })
                    }
                    _ => {
                        self.note(path, NoteAction::Dropped, format!("unusable interval {}", describe(value)));
                        None
                    }
                },
                _ => {
                    self.note(path, NoteAction::Dropped, format!("unusable interval {}", describe(value)));
                    None
                }
            },
            Value::String(s) if is_placeholder(s) => None,
            Value::String(s) => match parse_interval_text(s) {
                Some(ci) => {
                    self.note(path, NoteAction::Coerced, format!("converted {}", describe(value)));
                    Some(ci)
                }
                None => {
                    self.note(path, NoteAction::Dropped, format!("unusable interval {}", describe(value)));
                    None
                }
            },
            _ => {
                self.note(path, NoteAction::Dropped, format!("unusable interval {}", describe(value)));
                None
            }
        }
    }

    /// Confidence level as a fraction; "95" becomes 0.95
    fn level(&mut self, level: Option<f64>, path: &str) -> Option<f64> {
        let level = level?;
        if level > 0.0 && level <= 1.0 {
            Some(level)
        } else if level > 1.0 && level <= 100.0 {
            self.note(path, NoteAction::Coerced, format!("level {} read as a percentage", level));
            Some(level / 100.0)
        } else {
            self.note(path, NoteAction::Dropped, format!("unusable level {}", level));
            None
        }
    }

    fn incidence(&mut self, obj: &Map<String, Value>, base: &str) -> BTreeMap<String, Incidence> {
        let mut incidence = BTreeMap::new();
        let Some((key, value)) = first_present(obj, &["arm_data", "incidence", "by_arm", "arms"]) else {
            return incidence;
        };
        let path = join_path(base, key);

        match value {
            Value::Object(map) => {
                for (label, raw) in map {
                    let entry_path = format!("{}.{}", path, label);
                    if let Some(entry) = self.incidence_entry(raw, &entry_path) {
                        incidence.insert(label.trim().to_string(), entry);
                    }
                }
            }
            Value::Array(items) => {
                self.note(path.as_str(), NoteAction::Coerced, "list of arm entries keyed by label");
                for (index, raw) in items.iter().enumerate() {
                    let entry_path = format!("{}[{}]", path, index);
                    let label = match raw.as_object() {
                        Some(entry) => self.read::<String>(entry, &entry_path, &["arm", "arm_label", "label", "name"]),
                        None => None,
                    };
                    match label {
                        Some(label) => {
                            if let Some(entry) = self.incidence_entry(raw, &entry_path) {
                                incidence.insert(label, entry);
                            }
                        }
                        None => self.note(entry_path, NoteAction::SkippedElement, "arm entry without a label"),
                    }
                }
            }
            other => self.note(path, NoteAction::Dropped, format!("expected per-arm data, got {}", describe(other))),
        }
        incidence
    }

    fn incidence_entry(&mut self, raw: &Value, path: &str) -> Option<Incidence> {
        let entry = match raw {
            Value::Null => return None,
            Value::Object(map) => Incidence {
                percent: self.read(map, path, &["percent", "value_percent", "percentage", "pct", "rate"]),
                count: self.read(map, path, &["count", "n", "events", "number"]),
            },
            Value::Number(n) => {
                self.note(path, NoteAction::Coerced, format!("bare number {} read as a percentage", n));
                Incidence {
                    percent: n.as_f64(),
                    count: None,
                }
            }
            Value::String(s) if is_placeholder(s) => return None,
            Value::String(s) => {
                let numbers = scan_numbers(s);
                let percent = numbers.iter().find(|(_, pct)| *pct).map(|(v, _)| *v);
                let count = numbers
                    .iter()
                    .filter(|(_, pct)| !pct)
                    .find_map(|(v, _)| integral(*v));
                let entry = Incidence { percent, count };
                if !entry.is_empty() {
                    self.note(path, NoteAction::Coerced, format!("converted {}", describe(raw)));
                }
                entry
            }
            _ => Incidence::default(),
        };

        if entry.is_empty() {
            self.note(path, NoteAction::Dropped, format!("no count or percentage in {}", describe(raw)));
            return None;
        }
        Some(entry)
    }
}

/// The single key of `map` holding a non-empty list of objects
fn lone_list(map: &Map<String, Value>) -> Option<(&String, &Vec<Value>)> {
    if map.len() != 1 {
        return None;
    }
    let (key, value) = map.iter().next()?;
    match value {
        Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object) => Some((key, items)),
        _ => None,
    }
}

fn map_metadata(fields: &mut Fields<'_>, value: &Value) -> TrialMetadata {
    let Some(obj) = fields.object(value) else {
        return TrialMetadata::default();
    };
    TrialMetadata {
        title: fields.read(obj, "", &["title"]).unwrap_or_default(),
        trial_name: fields.read(obj, "", &["trial_name", "acronym"]),
        authors: fields.read(obj, "", &["authors", "author"]).unwrap_or_default(),
        journal: fields.read(obj, "", &["journal"]),
        year: fields.read(obj, "", &["year", "publication_year"]),
        doi: fields.read(obj, "", &["doi"]).map(strip_doi),
        registry_number: fields.read(obj, "", &["registry_number", "registration", "nct_id", "trial_registration"]),
        study_type: fields.read(obj, "", &["study_type"]),
    }
}

fn map_background(fields: &mut Fields<'_>, value: &Value) -> Background {
    let Some(obj) = fields.object(value) else {
        return Background::default();
    };
    Background {
        background: fields
            .read(obj, "", &["background", "context", "rationale"])
            .unwrap_or_default(),
        research_question: fields.read(obj, "", &["research_question", "objective", "objectives", "aim"]),
    }
}

fn map_design(fields: &mut Fields<'_>, value: &Value) -> StudyDesign {
    let Some(obj) = fields.object(value) else {
        return StudyDesign::default();
    };
    StudyDesign {
        design_type: fields
            .classify(
                obj,
                "",
                &["design_type", "study_design", "design"],
                DesignType::parse,
                |kind| !matches!(kind, DesignType::Unknown(_)),
            )
            .unwrap_or_default(),
        population_size: fields.read(
            obj,
            "",
            &["population_size", "sample_size", "total_participants", "n_total", "enrolled"],
        ),
        intervention: fields.read(obj, "", &["intervention"]),
        comparator: fields.read(obj, "", &["comparator", "control"]),
        follow_up: fields.read(obj, "", &["follow_up", "follow_up_duration", "follow_up_period"]),
        duration: fields.read(obj, "", &["duration", "treatment_duration"]),
        primary_outcome_names: fields
            .read(obj, "", &["primary_outcomes", "primary_outcome"])
            .unwrap_or_default(),
    }
}

/// Narrative results and the conclusions list
fn map_results(fields: &mut Fields<'_>, value: &Value) -> (ResultsSummary, Vec<String>) {
    let Some(obj) = fields.object(value) else {
        return (ResultsSummary::default(), Vec::new());
    };
    let results = ResultsSummary {
        main_finding: fields
            .read(obj, "", &["main_finding", "primary_result", "main_result"])
            .unwrap_or_default(),
        key_results: fields
            .read(obj, "", &["key_results", "secondary_results"])
            .unwrap_or_default(),
        adverse_events: fields
            .read(obj, "", &["adverse_events", "safety"])
            .unwrap_or_default(),
    };
    let conclusions = fields
        .read(obj, "", &["conclusions", "conclusion"])
        .unwrap_or_default();
    (results, conclusions)
}

fn map_limitations(fields: &mut Fields<'_>, value: &Value) -> Limitations {
    if let Value::Array(items) = value {
        if !items.is_empty() && !items.iter().any(Value::is_object) {
            fields.note(ROOT, NoteAction::Coerced, "list reply read as limitations");
            return Limitations {
                limitations: Vec::<String>::from_raw(value).value().unwrap_or_default(),
                ..Limitations::default()
            };
        }
    }
    let Some(obj) = fields.object(value) else {
        return Limitations::default();
    };
    Limitations {
        limitations: fields.read(obj, "", &["limitations"]).unwrap_or_default(),
        bias_risks: fields
            .read(obj, "", &["bias_risks", "biases", "risk_of_bias"])
            .unwrap_or_default(),
        generalizability: fields.read(obj, "", &["generalizability", "applicability"]),
    }
}

fn map_outcomes(fields: &mut Fields<'_>, value: &Value) -> OutcomeSet {
    let mut set = OutcomeSet::default();
    for (index, obj) in fields.elements(value) {
        let base = format!("outcomes[{}]", index);
        let partition = fields.partition(obj, &base);
        let outcome = Outcome {
            name: fields
                .read(obj, &base, &["name", "outcome", "outcome_name", "label"])
                .unwrap_or_default(),
            measure: fields
                .classify(
                    obj,
                    &base,
                    &["measure_type", "measure", "effect_measure"],
                    MeasureKind::parse,
                    MeasureKind::is_known,
                )
                .unwrap_or_default(),
            estimate: fields.read(obj, &base, &["estimate", "value", "point_estimate", "effect_size"]),
            confidence_interval: fields.interval(obj, &base),
            p_value: fields.read(obj, &base, &["p_value", "p", "pvalue"]),
            units: fields.read(obj, &base, &["units", "unit"]),
            definition: fields.read(obj, &base, &["definition", "description"]),
            is_primary: partition == OutcomePartition::Primary,
        };
        set.push(partition, outcome);
    }
    set
}

fn map_arms(fields: &mut Fields<'_>, value: &Value) -> Vec<Arm> {
    let mut arms = Vec::new();
    for (index, obj) in fields.elements(value) {
        let base = format!("arms[{}]", index);
        arms.push(Arm {
            label: fields
                .read(obj, &base, &["label", "arm", "arm_label", "name", "group"])
                .unwrap_or_default(),
            allocated: fields.read(
                obj,
                &base,
                &["n_allocated", "allocated", "n_randomized", "randomized", "n"],
            ),
            analyzed: fields.read(obj, &base, &["n_analyzed", "analyzed"]),
            completed: fields.read(obj, &base, &["n_completed", "completed"]),
            description: fields.read(obj, &base, &["description", "intervention"]),
        });
    }
    arms
}

fn map_safety_events(fields: &mut Fields<'_>, value: &Value) -> Vec<SafetyEvent> {
    let mut events = Vec::new();
    for (index, obj) in fields.elements(value) {
        let base = format!("safety_events[{}]", index);
        events.push(SafetyEvent {
            name: fields
                .read(obj, &base, &["event_name", "name", "event", "adverse_event"])
                .unwrap_or_default(),
            category: fields.read(obj, &base, &["event_type", "category", "type"]),
            incidence: fields.incidence(obj, &base),
            serious: fields
                .read(obj, &base, &["serious", "is_serious", "sae"])
                .unwrap_or(false),
            led_to_discontinuation: fields
                .read(obj, &base, &["led_to_discontinuation", "discontinuation"])
                .unwrap_or(false),
            notes: fields.read(obj, &base, &["notes"]),
        });
    }
    events
}

/// Type the raw output of every successful extractor
///
/// Facets absent from `raw` (failed or never run) keep their default, empty
/// values. Mapping is deterministic and never fails.
pub fn map_extractions(raw: &BTreeMap<Facet, Value>) -> Mapped {
    let mut summary = TrialSummary::default();
    let mut notes = Vec::new();

    for (facet, value) in raw {
        let mut fields = Fields {
            facet: *facet,
            notes: &mut notes,
        };
        match facet {
            Facet::Metadata => summary.metadata = map_metadata(&mut fields, value),
            Facet::Background => summary.background = map_background(&mut fields, value),
            Facet::Design => summary.design = map_design(&mut fields, value),
            Facet::Results => {
                let (results, conclusions) = map_results(&mut fields, value);
                summary.results = results;
                summary.conclusions = conclusions;
            }
            Facet::Limitations => summary.limitations = map_limitations(&mut fields, value),
            Facet::Outcomes => summary.outcomes = map_outcomes(&mut fields, value),
            Facet::Arms => summary.arms = map_arms(&mut fields, value),
            Facet::SafetyEvents => summary.safety_events = map_safety_events(&mut fields, value),
        }
    }

    // Design type falls back to the study type stated with the metadata
    if summary.design.design_type == DesignType::default() {
        if let Some(study_type) = summary.metadata.study_type.clone() {
            let kind = DesignType::parse(&study_type);
            notes.push(MappingNote {
                facet: Facet::Design,
                path: "design_type".to_string(),
                action: NoteAction::Coerced,
                detail: format!("taken from metadata.study_type '{}'", study_type),
            });
            if matches!(kind, DesignType::Unknown(_)) {
                notes.push(MappingNote {
                    facet: Facet::Design,
                    path: "design_type".to_string(),
                    action: NoteAction::Unclassified,
                    detail: study_type,
                });
            }
            summary.design.design_type = kind;
        }
    }

    Mapped { summary, notes }
}
