//! Data models for brewid-resolver
//!
//! - Extracted entities (AI/OCR output) and catalog records (read-only input)
//! - Match candidates and the tagged resolution decision
//! - Disambiguation session state machine and the resolved batch handed to
//!   persistence

pub mod catalog;
pub mod decision;
pub mod entity;
pub mod resolved;
pub mod session;
pub mod view;

pub use catalog::CatalogRecord;
pub use decision::{AuxiliarySignals, DecisionStatus, MatchCandidate, ResolutionDecision};
pub use entity::{AuxiliaryFields, EntityKey, EntityKind, ExtractedEntity, MissingField};
pub use resolved::{BreweryRef, ResolvedBatch, ResolvedEntity, ResolvedOutcome};
pub use session::{
    ChoiceOutcome, ConfirmationOrigin, DisambiguationSession, ManualFields, SessionEntry,
    SessionId, SessionStatus, UserChoice, UserResolution,
};
pub use view::{EntryView, Progress, SessionView};
