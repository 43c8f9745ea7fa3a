//! Resolution Classifier
//!
//! Turns a candidate list into one of four decisions. Rules are applied in
//! order; the first that holds wins:
//!
//! 1. No candidates → NO_MATCH
//! 2. Best similarity above `auto_match` and no other candidate above
//!    `candidate_floor` → AUTO_MATCH
//! 3. More than one candidate above `ambiguity`, or more than one keyword
//!    match → DISAMBIGUATE_MULTI
//! 4. Best candidate above `ambiguity` or with a keyword match →
//!    CONFIRM_SINGLE
//! 5. Otherwise → NO_MATCH
//!
//! Ambiguity (rule 3) deliberately outranks single confirmation (rule 4).

use brewid_common::config::{ResolverConfig, Thresholds};
use tracing::{debug, info};

use super::candidate_matcher::rank_candidates;
use crate::models::{MatchCandidate, ResolutionDecision};

/// Resolution Classifier
#[derive(Debug, Clone)]
pub struct ResolutionClassifier {
    thresholds: Thresholds,
    max_candidates: usize,
}

impl ResolutionClassifier {
    pub fn new(thresholds: Thresholds, max_candidates: usize) -> Self {
        Self {
            thresholds,
            max_candidates,
        }
    }

    pub fn from_config(config: &ResolverConfig) -> Self {
        Self::new(config.thresholds.clone(), config.max_candidates)
    }

    /// Classify a candidate list
    ///
    /// The input order does not matter: candidates are ranked internally
    /// before any rule is evaluated.
    pub fn classify(&self, candidates: &[MatchCandidate]) -> ResolutionDecision {
        let Thresholds {
            candidate_floor,
            ambiguity,
            auto_match,
            ..
        } = self.thresholds;

        let mut ranked = candidates.to_vec();
        rank_candidates(&mut ranked);

        let Some(best) = ranked.first() else {
            return ResolutionDecision::NoMatch;
        };

        let runner_up_plausible = ranked[1..]
            .iter()
            .any(|c| c.name_similarity > candidate_floor);
        if best.name_similarity > auto_match && !runner_up_plausible {
            debug!(
                record = %best.record.name,
                similarity = best.name_similarity,
                "Auto-match"
            );
            return ResolutionDecision::AutoMatch {
                candidate: best.clone(),
            };
        }

        let above_ambiguity = ranked
            .iter()
            .filter(|c| c.name_similarity > ambiguity)
            .count();
        let keyword_matches = ranked.iter().filter(|c| c.keyword_match).count();

        if above_ambiguity > 1 || keyword_matches > 1 {
            let mut offered: Vec<MatchCandidate> = ranked
                .into_iter()
                .filter(|c| c.name_similarity > candidate_floor || c.keyword_match)
                .collect();
            offered.truncate(self.max_candidates);

            info!(
                target: "brewid::ambiguity",
                above_ambiguity,
                keyword_matches,
                offered = offered.len(),
                top_similarity = offered.first().map(|c| c.name_similarity),
                "Ambiguous match, falling back to user disambiguation"
            );
            return ResolutionDecision::DisambiguateMulti { candidates: offered };
        }

        if best.name_similarity > ambiguity || best.keyword_match {
            let candidate = best.clone();
            let confidence = candidate.name_similarity;
            return ResolutionDecision::ConfirmSingle {
                candidate,
                confidence,
            };
        }

        debug!(
            record = %best.record.name,
            similarity = best.name_similarity,
            "Best candidate too weak, no match"
        );
        ResolutionDecision::NoMatch
    }
}
