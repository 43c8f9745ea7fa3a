//! Confirmation Workflow Controller
//!
//! Orchestrates one submission batch from analysis to commit:
//!
//! 1. `start_session` scores every extracted entity and opens a session
//! 2. `record_user_choice` applies human answers
//! 3. `save_verified_only` persists what is settled, leaving the rest pending
//! 4. `confirm_all` / `commit` freeze and persist the whole session
//!
//! All mutations of a session run under that session's mutex, including the
//! persistence await, so a double-submitted commit cannot persist twice.

use brewid_common::config::ResolverConfig;
use brewid_common::events::{EventBus, ResolverEvent};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::candidate_matcher::CandidateMatcher;
use super::catalog::{CatalogCommitter, CatalogSource};
use super::classifier::ResolutionClassifier;
use super::cleanup_guard::{CleanupReason, SessionCleanupGuard};
use super::session_store::SessionStore;
use crate::error::{ResolverError, ResolverResult};
use crate::models::{
    ChoiceOutcome, DisambiguationSession, EntityKey, ExtractedEntity, ResolutionDecision,
    SessionEntry, SessionId, SessionStatus, SessionView, UserChoice,
};

/// Upper bound for the configured session lifetime (100 years)
const MAX_TTL_SECONDS: u64 = 100 * 365 * 24 * 3600;

/// Result of a partial save
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveReport {
    pub session_id: SessionId,
    pub status: SessionStatus,
    /// Entities persisted by this call
    pub saved: Vec<EntityKey>,
    /// Entities still pending
    pub outstanding: Vec<EntityKey>,
    /// Resolved beers held back until their brewery is resolved
    pub deferred: Vec<EntityKey>,
}

/// Result of a full commit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitReport {
    pub session_id: SessionId,
    pub status: SessionStatus,
    /// Entities persisted by this call (empty on a replayed commit)
    pub saved: Vec<EntityKey>,
    pub entity_count: usize,
}

/// Result of an expiry sweep
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepReport {
    pub removed: Vec<SessionId>,
    /// Expired but kept because a human answer is still awaited
    pub retained: Vec<SessionId>,
}

/// Confirmation Workflow Controller
pub struct ConfirmationWorkflow {
    matcher: CandidateMatcher,
    classifier: ResolutionClassifier,
    guard: SessionCleanupGuard,
    store: SessionStore,
    committer: Arc<dyn CatalogCommitter>,
    event_bus: EventBus,
    session_ttl: Duration,
    session_max_age: Duration,
}

impl ConfirmationWorkflow {
    pub fn new(
        config: &ResolverConfig,
        committer: Arc<dyn CatalogCommitter>,
        event_bus: EventBus,
    ) -> Self {
        let ttl_seconds = config.session.ttl_seconds.min(MAX_TTL_SECONDS) as i64;
        let max_age_seconds = config
            .session
            .max_age_seconds
            .max(config.session.ttl_seconds)
            .min(MAX_TTL_SECONDS) as i64;
        Self {
            matcher: CandidateMatcher::from_config(config),
            classifier: ResolutionClassifier::from_config(config),
            guard: SessionCleanupGuard::from_policy(&config.session),
            store: SessionStore::new(),
            committer,
            event_bus,
            session_ttl: Duration::seconds(ttl_seconds),
            session_max_age: Duration::seconds(max_age_seconds),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn guard(&self) -> &SessionCleanupGuard {
        &self.guard
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    pub fn session_max_age(&self) -> Duration {
        self.session_max_age
    }

    /// Match and classify one entity against the catalog
    pub fn resolve_entity(
        &self,
        entity: &ExtractedEntity,
        source: &dyn CatalogSource,
    ) -> ResolutionDecision {
        let records = source.list_candidates(entity.kind, &entity.raw_label);
        let candidates = self.matcher.match_entity(entity, &records);
        let decision = self.classifier.classify(&candidates);
        debug!(
            bottle_index = entity.bottle_index,
            kind = %entity.kind,
            decision = decision.status().as_str(),
            candidates = candidates.len(),
            "Entity classified"
        );
        decision
    }

    /// Open a session for one analysis batch
    pub async fn start_session(
        &self,
        entities: Vec<ExtractedEntity>,
        source: &dyn CatalogSource,
    ) -> ResolverResult<SessionView> {
        if entities.is_empty() {
            return Err(ResolverError::InvalidInput(
                "analysis batch contains no entities".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for entity in &entities {
            if !seen.insert(entity.key()) {
                return Err(ResolverError::InvalidInput(format!(
                    "duplicate entity for {}",
                    entity.key()
                )));
            }
        }

        let entries: Vec<SessionEntry> = entities
            .into_iter()
            .map(|entity| {
                let decision = self.resolve_entity(&entity, source);
                SessionEntry::new(entity, decision)
            })
            .collect();

        let session = DisambiguationSession::new(entries);
        let view = SessionView::from(&session);
        let session_id = session.session_id.to_string();

        for entry in &session.entries {
            if let ResolutionDecision::DisambiguateMulti { candidates } = &entry.decision {
                self.event_bus.emit_lossy(ResolverEvent::AmbiguousMatchFallback {
                    session_id: session_id.clone(),
                    bottle_index: entry.entity.bottle_index,
                    kind: entry.entity.kind.to_string(),
                    candidate_count: candidates.len(),
                    top_similarity: candidates
                        .first()
                        .map(|c| c.name_similarity)
                        .unwrap_or_default(),
                    timestamp: Utc::now(),
                });
            }
        }

        self.store.insert(session).await;

        info!(
            session_id = %session_id,
            entities = view.progress.total,
            awaiting_human = view.progress.awaiting_human,
            outstanding = view.progress.outstanding,
            "Disambiguation session started"
        );
        self.event_bus.emit_lossy(ResolverEvent::SessionStarted {
            session_id,
            entity_count: view.progress.total,
            awaiting_human: view.progress.awaiting_human,
            timestamp: Utc::now(),
        });

        Ok(view)
    }

    pub async fn session_view(&self, id: &SessionId) -> ResolverResult<SessionView> {
        let handle = self.store.get(id).await?;
        let session = handle.lock().await;
        Ok(SessionView::from(&*session))
    }

    /// Apply a human choice to one entity
    pub async fn record_user_choice(
        &self,
        id: &SessionId,
        key: EntityKey,
        choice: UserChoice,
    ) -> ResolverResult<(ChoiceOutcome, SessionView)> {
        let handle = self.store.get(id).await?;
        let mut session = handle.lock().await;

        let outcome = session.apply_choice(key, choice)?;

        if let ChoiceOutcome::Applied {
            overrode_auto_match,
        } = outcome
        {
            let resolution = session
                .entry(key)
                .map(|e| e.resolution.label())
                .unwrap_or_default();
            info!(
                session_id = %id,
                bottle_index = key.bottle_index,
                kind = %key.kind,
                resolution,
                overrode_auto_match,
                "User choice recorded"
            );
            self.event_bus.emit_lossy(ResolverEvent::ChoiceRecorded {
                session_id: id.to_string(),
                bottle_index: key.bottle_index,
                kind: key.kind.to_string(),
                resolution: resolution.to_string(),
                overrode_auto_match,
                timestamp: Utc::now(),
            });
        } else {
            debug!(session_id = %id, entity = %key, "Identical choice replayed, nothing changed");
        }

        Ok((outcome, SessionView::from(&*session)))
    }

    /// Persist every settled, unsaved entity; pending ones stay in the session
    ///
    /// When nothing is left pending afterwards the session is complete and
    /// becomes Committed.
    pub async fn save_verified_only(&self, id: &SessionId) -> ResolverResult<SaveReport> {
        let handle = self.store.get(id).await?;
        let mut session = handle.lock().await;
        session.ensure_active()?;

        let batch = session.unsaved_batch();
        let saved = batch.keys();

        if !batch.is_empty() {
            match self.committer.commit_resolved_entities(&batch).await {
                Ok(receipt) => session.mark_saved(&saved, &receipt.record_ids),
                Err(e) => return Err(self.commit_failed(id, e.to_string())),
            }
        }

        let outstanding = session.outstanding();
        let deferred = session.deferred();
        let completed =
            outstanding.is_empty() && session.entries.iter().all(SessionEntry::is_saved);

        info!(
            session_id = %id,
            saved = saved.len(),
            outstanding = outstanding.len(),
            deferred = deferred.len(),
            "Verified entities saved"
        );
        self.event_bus.emit_lossy(ResolverEvent::PartialSaveCompleted {
            session_id: id.to_string(),
            saved: saved.len(),
            outstanding: outstanding.len(),
            timestamp: Utc::now(),
        });

        if completed {
            session.finish_commit();
            info!(session_id = %id, "Partial save covered the whole session");
            self.event_bus.emit_lossy(ResolverEvent::SessionCommitted {
                session_id: id.to_string(),
                entity_count: session.entries.len(),
                timestamp: Utc::now(),
            });
        }

        Ok(SaveReport {
            session_id: id.clone(),
            status: session.status,
            saved,
            outstanding,
            deferred,
        })
    }

    /// Freeze choices ahead of commit
    ///
    /// Fails with `IncompleteSession`, leaving the session Active, while any
    /// entity is pending.
    pub async fn confirm_all(&self, id: &SessionId) -> ResolverResult<SessionView> {
        let handle = self.store.get(id).await?;
        let mut session = handle.lock().await;

        if let Err(e) = session.begin_commit() {
            debug!(session_id = %id, error = %e, "Confirm-all refused");
            return Err(e);
        }

        info!(session_id = %id, "All entities confirmed, session committing");
        Ok(SessionView::from(&*session))
    }

    /// Persist the whole session
    ///
    /// A replay on a Committed session is a no-op. On persistence failure the
    /// session returns to Active with every choice intact.
    pub async fn commit(&self, id: &SessionId) -> ResolverResult<CommitReport> {
        let handle = self.store.get(id).await?;
        let mut session = handle.lock().await;

        if session.status == SessionStatus::Committed {
            debug!(session_id = %id, "Commit replayed on committed session");
            return Ok(CommitReport {
                session_id: id.clone(),
                status: session.status,
                saved: Vec::new(),
                entity_count: session.entries.len(),
            });
        }

        session.begin_commit()?;

        let batch = session.unsaved_batch();
        let saved = batch.keys();

        if !batch.is_empty() {
            match self.committer.commit_resolved_entities(&batch).await {
                Ok(receipt) => session.mark_saved(&saved, &receipt.record_ids),
                Err(e) => {
                    session.revert_commit();
                    return Err(self.commit_failed(id, e.to_string()));
                }
            }
        }

        session.finish_commit();

        let entity_count = session.entries.len();
        info!(
            session_id = %id,
            entity_count,
            saved = saved.len(),
            "Session committed"
        );
        self.event_bus.emit_lossy(ResolverEvent::SessionCommitted {
            session_id: id.to_string(),
            entity_count,
            timestamp: Utc::now(),
        });

        Ok(CommitReport {
            session_id: id.clone(),
            status: session.status,
            saved,
            entity_count,
        })
    }

    /// Would the guard let `reason` discard this session now?
    pub async fn can_cleanup(&self, id: &SessionId, reason: &CleanupReason) -> ResolverResult<bool> {
        let handle = self.store.get(id).await?;
        let session = handle.lock().await;
        Ok(self.guard.can_cleanup(&session, reason))
    }

    /// Guarded cleanup (logout, role change, admin action, ...)
    pub async fn cleanup(&self, id: &SessionId, reason: CleanupReason) -> ResolverResult<()> {
        let handle = self.store.get(id).await?;
        let mut session = handle.lock().await;

        if let Err(e) = self.guard.check(&session, &reason) {
            let awaiting_human = session.awaiting_human();
            warn!(
                session_id = %id,
                reason = %reason,
                awaiting_human,
                "Cleanup refused, human disambiguation in progress"
            );
            self.event_bus.emit_lossy(ResolverEvent::CleanupRefused {
                session_id: id.to_string(),
                reason: reason.to_string(),
                awaiting_human,
                timestamp: Utc::now(),
            });
            return Err(e);
        }

        let was_committed = session.status == SessionStatus::Committed;
        if !was_committed {
            session.abandon()?;
        }
        drop(session);
        self.store.remove(id).await;

        if was_committed {
            debug!(session_id = %id, reason = %reason, "Committed session released");
        } else {
            self.session_abandoned(id, reason.as_str());
        }
        Ok(())
    }

    /// Owner discards the session; not subject to the cleanup guard
    pub async fn abandon(&self, id: &SessionId) -> ResolverResult<()> {
        let handle = self.store.get(id).await?;
        let mut session = handle.lock().await;
        session.abandon()?;
        drop(session);

        self.store.remove(id).await;
        self.session_abandoned(id, "user");
        Ok(())
    }

    /// Release expired sessions
    ///
    /// Committed sessions go once `session_ttl` has passed since they were
    /// committed. Unfinished ones go once `session_ttl` has passed since
    /// creation, unless the guard refuses [`CleanupReason::Timeout`]; once
    /// `session_max_age` has passed they go regardless. Sessions busy with
    /// another operation are left for the next sweep.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        for id in self.store.ids().await {
            let Ok(handle) = self.store.get(&id).await else {
                continue;
            };
            let Ok(mut session) = handle.try_lock() else {
                continue;
            };

            let status = session.status;
            let release = match status {
                SessionStatus::Committed => now - session.updated_at >= self.session_ttl,
                SessionStatus::Abandoned => true,
                _ if session.is_expired(now, self.session_max_age) => {
                    warn!(
                        session_id = %id,
                        awaiting_human = session.awaiting_human(),
                        "Session exceeded maximum age, releasing"
                    );
                    if session.abandon().is_ok() {
                        self.session_abandoned(&id, CleanupReason::MaxAge.as_str());
                    }
                    true
                }
                _ if session.is_expired(now, self.session_ttl) => {
                    if !self.guard.can_cleanup(&session, &CleanupReason::Timeout) {
                        debug!(
                            session_id = %id,
                            awaiting_human = session.awaiting_human(),
                            "Expired session retained"
                        );
                        report.retained.push(id);
                        continue;
                    }
                    if session.abandon().is_ok() {
                        self.session_abandoned(&id, CleanupReason::Timeout.as_str());
                    }
                    true
                }
                _ => false,
            };

            if release {
                drop(session);
                self.store.remove(&id).await;
                report.removed.push(id);
            }
        }

        if !report.removed.is_empty() || !report.retained.is_empty() {
            info!(
                removed = report.removed.len(),
                retained = report.retained.len(),
                "Session sweep complete"
            );
        }
        report
    }

    fn session_abandoned(&self, id: &SessionId, reason: &str) {
        info!(session_id = %id, reason, "Session abandoned");
        self.event_bus.emit_lossy(ResolverEvent::SessionAbandoned {
            session_id: id.to_string(),
            reason: reason.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn commit_failed(&self, id: &SessionId, error: String) -> ResolverError {
        warn!(session_id = %id, error = %error, "Persistence failed, session left active");
        self.event_bus.emit_lossy(ResolverEvent::CommitFailed {
            session_id: id.to_string(),
            error: error.clone(),
            timestamp: Utc::now(),
        });
        ResolverError::UpstreamUnavailable(error)
    }
}
