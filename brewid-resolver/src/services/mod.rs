//! Resolution engine services
//!
//! Scoring, matching and classification are pure functions over a catalog
//! snapshot. Session state, cleanup policy and the confirmation workflow
//! build on top of them.

pub mod candidate_matcher;
pub mod catalog;
pub mod classifier;
pub mod cleanup_guard;
pub mod session_store;
pub mod similarity;
pub mod workflow;

pub use candidate_matcher::CandidateMatcher;
pub use catalog::{CatalogCommitter, CatalogSource, CommitError, CommitReceipt, MemoryCatalog};
pub use classifier::ResolutionClassifier;
pub use cleanup_guard::{CleanupReason, SessionCleanupGuard};
pub use session_store::{SessionHandle, SessionStore};
pub use similarity::SimilarityScorer;
pub use workflow::{CommitReport, ConfirmationWorkflow, SaveReport, SweepReport};
