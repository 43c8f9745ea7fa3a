//! End-to-end resolution scenarios
//!
//! Matcher, classifier and session driven together through the workflow
//! against an in-memory catalog.

use brewid_common::config::ResolverConfig;
use brewid_common::events::EventBus;
use brewid_resolver::models::{
    CatalogRecord, DecisionStatus, EntityKey, EntityKind, ExtractedEntity, ResolutionDecision,
    SessionStatus, UserChoice,
};
use brewid_resolver::services::{
    CandidateMatcher, CleanupReason, ConfirmationWorkflow, MemoryCatalog, ResolutionClassifier,
};
use brewid_resolver::ResolverError;
use std::sync::Arc;

fn config() -> ResolverConfig {
    ResolverConfig::default()
}

fn resolve(label: &str, catalog: &[CatalogRecord]) -> (Vec<String>, ResolutionDecision) {
    let matcher = CandidateMatcher::from_config(&config());
    let classifier = ResolutionClassifier::from_config(&config());
    let entity = ExtractedEntity::brewery(label, 0);

    let candidates = matcher.match_entity(&entity, catalog);
    let names = candidates.iter().map(|c| c.record.name.clone()).collect();
    (names, classifier.classify(&candidates))
}

fn workflow(catalog: Arc<MemoryCatalog>) -> ConfirmationWorkflow {
    ConfirmationWorkflow::new(&config(), catalog, EventBus::new(64))
}

/// Scenario A: embedded distinctive word recovered by keyword overlap
#[test]
fn scenario_a_viana_against_mixed_catalog() {
    // Given: a catalog with one related and two unrelated breweries
    let catalog = vec![
        CatalogRecord::brewery("Birrificio Viana S.r.l."),
        CatalogRecord::brewery("Heineken"),
        CatalogRecord::brewery("Peroni"),
    ];

    // When: the extracted name is resolved
    let (names, decision) = resolve("Birrificio Indipendente Viana", &catalog);

    // Then: only the Viana entry survives and needs a human yes/no
    assert_eq!(names, vec!["Birrificio Viana S.r.l."]);
    assert!(matches!(
        decision.status(),
        DecisionStatus::ConfirmSingle | DecisionStatus::AutoMatch
    ));
    let record = decision.record().expect("single-match decision carries a record");
    assert_eq!(record.name, "Birrificio Viana S.r.l.");

    match decision {
        ResolutionDecision::ConfirmSingle { candidate, confidence } => {
            assert!(candidate.keyword_match);
            assert_eq!(confidence, candidate.name_similarity);
        }
        ResolutionDecision::AutoMatch { .. } => {}
        other => panic!("unexpected decision {:?}", other),
    }
}

/// Scenario B: two plausible breweries force a human pick
#[test]
fn scenario_b_two_viana_breweries_disambiguate() {
    let srl = CatalogRecord::brewery("Birrificio Viana S.r.l.");
    let indipendente = CatalogRecord::brewery("Birrificio Indipendente Viana");
    let catalog = vec![srl.clone(), indipendente.clone(), CatalogRecord::brewery("Heineken")];

    let (_, decision) = resolve("Birrificio Viana", &catalog);

    match decision {
        ResolutionDecision::DisambiguateMulti { candidates } => {
            let ids: Vec<_> = candidates.iter().map(|c| c.record.id).collect();
            assert_eq!(ids, vec![srl.id, indipendente.id]);
            assert!(candidates.iter().all(|c| c.keyword_match));
        }
        other => panic!("expected DisambiguateMulti, got {:?}", other),
    }
}

/// Scenario C: unrelated catalog means a new record
#[test]
fn scenario_c_unrelated_catalog_no_match() {
    let catalog = vec![
        CatalogRecord::brewery("Birrificio Viana S.r.l."),
        CatalogRecord::brewery("Heineken"),
        CatalogRecord::brewery("Peroni"),
        CatalogRecord::brewery("Birrificio Indipendente Viana"),
    ];

    let (names, decision) = resolve("Zzyzx Brewing Experimental", &catalog);

    assert!(names.is_empty());
    assert_eq!(decision, ResolutionDecision::NoMatch);
}

/// Scenario D: partial save keeps the rest pending and blocks confirm-all
#[tokio::test]
async fn scenario_d_partial_save_then_incomplete_confirm() {
    // Given: three entities, each awaiting a human pick
    let catalog = Arc::new(MemoryCatalog::new(vec![
        CatalogRecord::brewery("Birrificio Viana S.r.l."),
        CatalogRecord::brewery("Birrificio Indipendente Viana"),
        CatalogRecord::brewery("Le Baladin"),
        CatalogRecord::brewery("Baladin S.r.l."),
    ]));
    let wf = workflow(catalog.clone());

    let view = wf
        .start_session(
            vec![
                ExtractedEntity::brewery("Birrificio Viana", 0),
                ExtractedEntity::brewery("Birrificio Viana", 1),
                ExtractedEntity::brewery("Baladin", 2),
            ],
            &*catalog,
        )
        .await
        .unwrap();
    let id = view.session_id.clone();
    assert_eq!(view.progress.total, 3);
    assert_eq!(view.progress.outstanding, 3);

    // Resolve exactly one
    let first = EntityKey::new(0, EntityKind::Brewery);
    let offered = view.entries[0].decision.candidates()[0].record.id;
    wf.record_user_choice(&id, first, UserChoice::Confirm { record_id: offered })
        .await
        .unwrap();

    // When: only verified entities are saved
    let report = wf.save_verified_only(&id).await.unwrap();

    // Then: one persisted, two outstanding, session still active
    assert_eq!(report.saved, vec![first]);
    assert_eq!(report.outstanding.len(), 2);
    assert_eq!(report.status, SessionStatus::Active);

    let view = wf.session_view(&id).await.unwrap();
    assert_eq!(view.progress.saved, 1);
    assert_eq!(view.entries[0].saved_record_id, Some(offered));

    // And: confirm-all fails until both remaining entities are resolved
    let err = wf.confirm_all(&id).await.unwrap_err();
    assert_eq!(err, ResolverError::IncompleteSession { outstanding: 2 });

    wf.record_user_choice(&id, EntityKey::new(1, EntityKind::Brewery), UserChoice::RejectCreateNew)
        .await
        .unwrap();
    let err = wf.confirm_all(&id).await.unwrap_err();
    assert_eq!(err, ResolverError::IncompleteSession { outstanding: 1 });
    assert_eq!(wf.session_view(&id).await.unwrap().status, SessionStatus::Active);

    wf.record_user_choice(&id, EntityKey::new(2, EntityKind::Brewery), UserChoice::RejectCreateNew)
        .await
        .unwrap();
    let view = wf.confirm_all(&id).await.unwrap();
    assert_eq!(view.status, SessionStatus::Committing);

    let report = wf.commit(&id).await.unwrap();
    assert_eq!(report.status, SessionStatus::Committed);
    assert_eq!(report.saved.len(), 2);
    // Two breweries created on top of the four seeded ones
    assert_eq!(catalog.len(), 6);
}

/// Classification does not depend on the order candidates arrive in
#[test]
fn auto_match_is_order_independent() {
    let matcher = CandidateMatcher::from_config(&config());
    let classifier = ResolutionClassifier::from_config(&config());
    let entity = ExtractedEntity::brewery("Heineken", 0);
    let heineken = CatalogRecord::brewery("Heineken");
    let catalog = vec![
        CatalogRecord::brewery("Heineken Italia"),
        CatalogRecord::brewery("Peroni"),
        heineken.clone(),
    ];

    let mut candidates = matcher.match_entity(&entity, &catalog);
    // Keyword overlap keeps the weaker Heineken Italia as a candidate
    assert_eq!(candidates.len(), 2);
    let forward = classifier.classify(&candidates);
    candidates.reverse();
    let backward = classifier.classify(&candidates);

    assert_eq!(forward, backward);
    assert_eq!(forward.status(), DecisionStatus::AutoMatch);
    assert_eq!(forward.record().map(|r| r.id), Some(heineken.id));
}

/// A near-identical second record blocks auto-match
#[test]
fn near_duplicates_never_auto_match() {
    let catalog = vec![
        CatalogRecord::brewery("Heineken"),
        CatalogRecord::brewery("Heiniken"),
    ];
    let (names, decision) = resolve("Heineken", &catalog);
    assert_eq!(names.len(), 2);
    assert_ne!(decision.status(), DecisionStatus::AutoMatch);
    assert_eq!(decision.status(), DecisionStatus::DisambiguateMulti);
}

/// Guard refuses an unlisted reason while a pick is pending, then allows it
#[tokio::test]
async fn cleanup_guard_follows_pending_work() {
    let catalog = Arc::new(MemoryCatalog::new(vec![
        CatalogRecord::brewery("Birrificio Viana S.r.l."),
        CatalogRecord::brewery("Birrificio Indipendente Viana"),
    ]));
    let wf = workflow(catalog.clone());
    let view = wf
        .start_session(vec![ExtractedEntity::brewery("Birrificio Viana", 0)], &*catalog)
        .await
        .unwrap();
    let id = view.session_id.clone();
    let manual = CleanupReason::from("manual");

    assert!(!wf.can_cleanup(&id, &manual).await.unwrap());
    assert!(wf.can_cleanup(&id, &CleanupReason::Logout).await.unwrap());

    wf.record_user_choice(&id, EntityKey::new(0, EntityKind::Brewery), UserChoice::RejectCreateNew)
        .await
        .unwrap();
    assert!(wf.can_cleanup(&id, &manual).await.unwrap());
}

/// Identical replay of a choice leaves the session untouched
#[tokio::test]
async fn identical_choice_replay_is_noop() {
    let srl = CatalogRecord::brewery("Birrificio Viana S.r.l.");
    let catalog = Arc::new(MemoryCatalog::new(vec![
        srl.clone(),
        CatalogRecord::brewery("Birrificio Indipendente Viana"),
    ]));
    let wf = workflow(catalog.clone());
    let view = wf
        .start_session(vec![ExtractedEntity::brewery("Birrificio Viana", 0)], &*catalog)
        .await
        .unwrap();
    let id = view.session_id.clone();
    let key = EntityKey::new(0, EntityKind::Brewery);
    let choice = UserChoice::Confirm { record_id: srl.id };

    let (_, first) = wf.record_user_choice(&id, key, choice.clone()).await.unwrap();
    let (outcome, second) = wf.record_user_choice(&id, key, choice).await.unwrap();

    assert_eq!(outcome, brewid_resolver::models::ChoiceOutcome::Unchanged);
    assert_eq!(first, second);
}
