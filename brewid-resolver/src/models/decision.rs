//! Match candidates and resolution decisions
//!
//! A decision is a closed set of four states. Each state carries exactly the
//! data it needs, so combinations like "needs disambiguation" with an empty
//! candidate list cannot be represented.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::catalog::CatalogRecord;

/// Agreement of auxiliary label fields with a catalog record
///
/// Boosts ordering among plausible candidates; never sufficient on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxiliarySignals {
    pub website: bool,
    pub email: bool,
    pub address: bool,
    pub beer_type: bool,
    pub abv: bool,
    pub brewery: bool,
}

impl AuxiliarySignals {
    /// Number of agreeing fields
    pub fn count(&self) -> usize {
        [
            self.website,
            self.email,
            self.address,
            self.beer_type,
            self.abv,
            self.brewery,
        ]
        .iter()
        .filter(|s| **s)
        .count()
    }
}

/// One catalog record scored against one extracted entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub record: CatalogRecord,
    /// Normalized edit-distance similarity (0.0-1.0)
    pub name_similarity: f64,
    /// Names share a dictionary keyword or several near-identical tokens
    pub keyword_match: bool,
    pub auxiliary_signals: AuxiliarySignals,
}

/// Coarse decision state, for logging and progress display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionStatus {
    AutoMatch,
    ConfirmSingle,
    DisambiguateMulti,
    NoMatch,
}

impl DecisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionStatus::AutoMatch => "AUTO_MATCH",
            DecisionStatus::ConfirmSingle => "CONFIRM_SINGLE",
            DecisionStatus::DisambiguateMulti => "DISAMBIGUATE_MULTI",
            DecisionStatus::NoMatch => "NO_MATCH",
        }
    }
}

/// Classifier verdict for one extracted entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionDecision {
    /// Accepted without a human step
    AutoMatch { candidate: MatchCandidate },
    /// One plausible match, needs an explicit yes/no
    ConfirmSingle {
        candidate: MatchCandidate,
        confidence: f64,
    },
    /// Several plausible matches, human picks one or none (always two or more)
    DisambiguateMulti { candidates: Vec<MatchCandidate> },
    /// Nothing plausible, a new record will be created
    NoMatch,
}

impl ResolutionDecision {
    pub fn status(&self) -> DecisionStatus {
        match self {
            ResolutionDecision::AutoMatch { .. } => DecisionStatus::AutoMatch,
            ResolutionDecision::ConfirmSingle { .. } => DecisionStatus::ConfirmSingle,
            ResolutionDecision::DisambiguateMulti { .. } => DecisionStatus::DisambiguateMulti,
            ResolutionDecision::NoMatch => DecisionStatus::NoMatch,
        }
    }

    /// Matched record for AutoMatch and ConfirmSingle
    pub fn record(&self) -> Option<&CatalogRecord> {
        match self {
            ResolutionDecision::AutoMatch { candidate }
            | ResolutionDecision::ConfirmSingle { candidate, .. } => Some(&candidate.record),
            _ => None,
        }
    }

    /// Candidates offered to the user, in display order
    pub fn candidates(&self) -> Vec<&MatchCandidate> {
        match self {
            ResolutionDecision::AutoMatch { candidate }
            | ResolutionDecision::ConfirmSingle { candidate, .. } => vec![candidate],
            ResolutionDecision::DisambiguateMulti { candidates } => candidates.iter().collect(),
            ResolutionDecision::NoMatch => Vec::new(),
        }
    }

    /// Candidate for `record_id` if this decision offers it
    pub fn offers(&self, record_id: Uuid) -> Option<&MatchCandidate> {
        self.candidates()
            .into_iter()
            .find(|c| c.record.id == record_id)
    }

    /// True when a human response is required before commit
    pub fn awaits_human(&self) -> bool {
        matches!(
            self,
            ResolutionDecision::ConfirmSingle { .. } | ResolutionDecision::DisambiguateMulti { .. }
        )
    }
}
