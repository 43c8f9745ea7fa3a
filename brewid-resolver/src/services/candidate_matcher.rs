//! Candidate Matcher
//!
//! Scores one extracted entity against every same-kind catalog record and
//! keeps the plausible ones, ranked. Pure read against the catalog.

use brewid_common::config::ResolverConfig;
use std::cmp::Ordering;
use tracing::debug;

use super::similarity::{name_similarity, normalize, SimilarityScorer};
use crate::models::{AuxiliarySignals, CatalogRecord, EntityKind, ExtractedEntity, MatchCandidate};

/// ABV values within this many percentage points agree
const ABV_TOLERANCE: f64 = 0.3;

/// Addresses at or above this similarity agree
const ADDRESS_SIMILARITY: f64 = 0.8;

/// Candidate Matcher
#[derive(Debug, Clone)]
pub struct CandidateMatcher {
    scorer: SimilarityScorer,
    /// Similarity a record must exceed unless it has keyword overlap
    candidate_floor: f64,
    max_candidates: usize,
}

impl CandidateMatcher {
    pub fn new(scorer: SimilarityScorer, candidate_floor: f64, max_candidates: usize) -> Self {
        Self {
            scorer,
            candidate_floor,
            max_candidates,
        }
    }

    pub fn from_config(config: &ResolverConfig) -> Self {
        Self::new(
            SimilarityScorer::from_config(config),
            config.thresholds.candidate_floor,
            config.max_candidates,
        )
    }

    /// Ranked plausible candidates for `entity`
    ///
    /// Keeps records with similarity above the floor or keyword overlap,
    /// sorted by [`compare_candidates`] and capped. An empty result means no
    /// plausible match, not an error.
    pub fn match_entity(
        &self,
        entity: &ExtractedEntity,
        catalog: &[CatalogRecord],
    ) -> Vec<MatchCandidate> {
        let mut candidates: Vec<MatchCandidate> = catalog
            .iter()
            .filter(|record| record.kind == entity.kind)
            .filter_map(|record| {
                let similarity = name_similarity(&entity.raw_label, &record.name);
                let keyword_match = self.scorer.has_common_keyword(&entity.raw_label, &record.name);

                if similarity <= self.candidate_floor && !keyword_match {
                    return None;
                }

                Some(MatchCandidate {
                    record: record.clone(),
                    name_similarity: similarity,
                    keyword_match,
                    auxiliary_signals: auxiliary_signals(entity, record),
                })
            })
            .collect();

        rank_candidates(&mut candidates);
        candidates.truncate(self.max_candidates);

        debug!(
            bottle_index = entity.bottle_index,
            kind = %entity.kind,
            label = %entity.raw_label,
            catalog_size = catalog.len(),
            candidates = candidates.len(),
            top_similarity = ?candidates.first().map(|c| c.name_similarity),
            "Candidate matching complete"
        );

        candidates
    }
}

/// Candidate ordering: similarity desc, then keyword overlap, then number of
/// agreeing auxiliary fields, then record id so that full ties are total
pub fn compare_candidates(a: &MatchCandidate, b: &MatchCandidate) -> Ordering {
    b.name_similarity
        .total_cmp(&a.name_similarity)
        .then_with(|| b.keyword_match.cmp(&a.keyword_match))
        .then_with(|| {
            b.auxiliary_signals
                .count()
                .cmp(&a.auxiliary_signals.count())
        })
        .then_with(|| a.record.id.cmp(&b.record.id))
}

/// Sort in place with [`compare_candidates`]
pub fn rank_candidates(candidates: &mut [MatchCandidate]) {
    candidates.sort_by(compare_candidates);
}

/// Compare label hints with a record, only where both sides have a value
pub fn auxiliary_signals(entity: &ExtractedEntity, record: &CatalogRecord) -> AuxiliarySignals {
    let aux = &entity.auxiliary;
    let both = |a: &Option<String>, b: &Option<String>, agree: fn(&str, &str) -> bool| match (a, b) {
        (Some(a), Some(b)) => agree(a, b),
        _ => false,
    };

    let mut signals = AuxiliarySignals {
        website: both(&aux.website, &record.website, |a, b| {
            let (a, b) = (website_host(a), website_host(b));
            !a.is_empty() && a == b
        }),
        email: both(&aux.email, &record.email, |a, b| {
            a.trim().eq_ignore_ascii_case(b.trim())
        }),
        address: both(&aux.address, &record.address, |a, b| {
            name_similarity(a, b) >= ADDRESS_SIMILARITY
        }),
        ..Default::default()
    };

    if entity.kind == EntityKind::Beer {
        signals.beer_type = both(&aux.beer_type, &record.beer_type, |a, b| {
            let a = normalize(a);
            !a.is_empty() && a == normalize(b)
        });
        signals.abv = matches!(
            (aux.abv, record.abv),
            (Some(a), Some(b)) if (a - b).abs() <= ABV_TOLERANCE
        );
        signals.brewery = matches!(
            (aux.brewery_id, record.brewery_id),
            (Some(a), Some(b)) if a == b
        );
    }

    signals
}

/// Host part of a URL, lower-cased, without scheme or `www.`
fn website_host(url: &str) -> String {
    let url = url.trim().to_lowercase();
    let without_scheme = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(&url);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    host.trim_start_matches("www.").to_string()
}
