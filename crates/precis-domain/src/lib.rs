//! Precis Domain Layer
//!
//! This crate contains the data model shared by every stage of an extraction
//! run, plus the trait interfaces for the external collaborators (the
//! generative-text service and the retrieval service).
//!
//! ## Key Concepts
//!
//! - **Segment**: a bounded, ordered slice of the source document
//! - **PartialSummary / Overview**: Stage 1 output (per segment, then reduced)
//! - **Facet**: one specialized category of information to extract
//! - **TrialSummary**: the typed aggregate with variable-length entity lists
//! - **MappingNote**: a coercion decision recorded while typing raw JSON
//!
//! ## Architecture
//!
//! - Pure data and trait definitions only
//! - Infrastructure implementations live in other crates
//! - Every list in the model is `0..N`; nothing indexes by fixed position

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arm;
pub mod document;
pub mod facet;
pub mod mapping;
pub mod outcome;
pub mod safety;
pub mod segment;
pub mod traits;
pub mod trial;

// Re-exports for convenience
pub use arm::Arm;
pub use document::{Document, RunId};
pub use facet::Facet;
pub use mapping::{MappingNote, NoteAction};
pub use outcome::{ConfidenceInterval, MeasureKind, Outcome, OutcomePartition};
pub use safety::{Incidence, SafetyEvent};
pub use segment::{Overview, OverviewSource, PartialSummary, Segment};
pub use trial::{
    Background, DesignType, Limitations, OutcomeSet, ResultsSummary, StudyDesign,
    TrialMetadata, TrialSummary, SCHEMA_VERSION,
};
