//! Disambiguation session state machine
//!
//! Per entity: `Pending → Confirmed | RejectedCreateNew | ManuallyCompleted`.
//! Terminal states are final, with one exception: an automatic confirmation
//! may be overridden by the user while the session is still Active and the
//! entity has not been saved.
//!
//! Per session: `Active → Committing → Committed`, `Active → Abandoned`.
//! A failed commit returns the session to Active.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use super::catalog::CatalogRecord;
use super::decision::ResolutionDecision;
use super::entity::{EntityKey, EntityKind, ExtractedEntity};
use super::resolved::{BreweryRef, ResolvedBatch, ResolvedEntity, ResolvedOutcome};
use super::view::Progress;
use crate::error::{ResolverError, ResolverResult};

/// Opaque, unguessable session identifier (256 random bits, URL-safe)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        let bytes: [u8; 32] = rand::random();
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionStatus {
    /// Accepting human choices
    Active,
    /// Every entity resolved, choices frozen, persistence pending
    Committing,
    /// Persistence acknowledged the whole session
    Committed,
    /// Discarded before commit
    Abandoned,
}

/// Fields supplied by a human for a new record or to fill gaps in a match
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualFields {
    pub name: Option<String>,
    pub website: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub beer_type: Option<String>,
    pub abv: Option<f64>,
}

impl ManualFields {
    /// Label data as a starting point for a new record
    pub fn from_entity(entity: &ExtractedEntity) -> Self {
        let name = entity.raw_label.trim();
        Self {
            name: (!name.is_empty()).then(|| name.to_string()),
            website: entity.auxiliary.website.clone(),
            email: entity.auxiliary.email.clone(),
            address: entity.auxiliary.address.clone(),
            beer_type: entity.auxiliary.beer_type.clone(),
            abv: entity.auxiliary.abv,
        }
    }

    /// Fields of `other` replace ours where present
    pub fn overlay(self, other: &ManualFields) -> Self {
        Self {
            name: other.name.clone().or(self.name),
            website: other.website.clone().or(self.website),
            email: other.email.clone().or(self.email),
            address: other.address.clone().or(self.address),
            beer_type: other.beer_type.clone().or(self.beer_type),
            abv: other.abv.or(self.abv),
        }
    }

    /// Reject obviously malformed input
    pub fn validate(&self) -> ResolverResult<()> {
        let blank = |value: &Option<String>| value.as_deref().is_some_and(|v| v.trim().is_empty());

        if blank(&self.name) {
            return Err(ResolverError::InvalidChoice("name must not be blank".to_string()));
        }
        if blank(&self.website) || blank(&self.address) || blank(&self.beer_type) {
            return Err(ResolverError::InvalidChoice(
                "provided fields must not be blank".to_string(),
            ));
        }
        if let Some(email) = &self.email {
            if !email.contains('@') || email.chars().any(char::is_whitespace) {
                return Err(ResolverError::InvalidChoice(format!("invalid email: {}", email)));
            }
        }
        if let Some(abv) = self.abv {
            if !abv.is_finite() || !(0.0..=100.0).contains(&abv) {
                return Err(ResolverError::InvalidChoice(format!("ABV out of range: {}", abv)));
            }
        }
        Ok(())
    }
}

/// Who confirmed a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationOrigin {
    /// Auto-match, shown for transparency and still overridable
    Automatic,
    User,
}

/// Human input for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UserChoice {
    /// Accept an offered candidate
    Confirm { record_id: Uuid },
    /// Decline all candidates; a record is created from label data
    RejectCreateNew,
    /// Supply fields, either for a new record or to fill gaps in an offered one
    ManuallyComplete {
        #[serde(default)]
        record_id: Option<Uuid>,
        fields: ManualFields,
    },
}

/// Per-entity human resolution state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UserResolution {
    Pending,
    Confirmed {
        record: CatalogRecord,
        origin: ConfirmationOrigin,
    },
    RejectedCreateNew,
    ManuallyCompleted {
        record_id: Option<Uuid>,
        fields: ManualFields,
    },
}

impl UserResolution {
    pub fn is_pending(&self) -> bool {
        matches!(self, UserResolution::Pending)
    }

    pub fn label(&self) -> &'static str {
        match self {
            UserResolution::Pending => "pending",
            UserResolution::Confirmed { .. } => "confirmed",
            UserResolution::RejectedCreateNew => "rejected_create_new",
            UserResolution::ManuallyCompleted { .. } => "manually_completed",
        }
    }

    fn is_automatic(&self) -> bool {
        matches!(
            self,
            UserResolution::Confirmed {
                origin: ConfirmationOrigin::Automatic,
                ..
            }
        )
    }

    /// True when `choice` would produce exactly this state
    fn matches_choice(&self, choice: &UserChoice) -> bool {
        match (self, choice) {
            (UserResolution::Confirmed { record, .. }, UserChoice::Confirm { record_id }) => {
                record.id == *record_id
            }
            (UserResolution::RejectedCreateNew, UserChoice::RejectCreateNew) => true,
            (
                UserResolution::ManuallyCompleted { record_id, fields },
                UserChoice::ManuallyComplete {
                    record_id: chosen_id,
                    fields: chosen_fields,
                },
            ) => record_id == chosen_id && fields == chosen_fields,
            _ => false,
        }
    }
}

/// Result of applying a user choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChoiceOutcome {
    Applied { overrode_auto_match: bool },
    /// Identical replay of the current state
    Unchanged,
}

/// One entity of the batch with its decision and resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub entity: ExtractedEntity,
    pub decision: ResolutionDecision,
    pub resolution: UserResolution,
    /// Catalog id assigned or confirmed when this entry was persisted
    pub saved_record_id: Option<Uuid>,
    pub saved_at: Option<DateTime<Utc>>,
}

impl SessionEntry {
    /// Auto-matches start confirmed, everything else pending
    pub fn new(entity: ExtractedEntity, decision: ResolutionDecision) -> Self {
        let resolution = match &decision {
            ResolutionDecision::AutoMatch { candidate } => UserResolution::Confirmed {
                record: candidate.record.clone(),
                origin: ConfirmationOrigin::Automatic,
            },
            _ => UserResolution::Pending,
        };
        Self {
            entity,
            decision,
            resolution,
            saved_record_id: None,
            saved_at: None,
        }
    }

    pub fn key(&self) -> EntityKey {
        self.entity.key()
    }

    pub fn is_saved(&self) -> bool {
        self.saved_at.is_some()
    }

    /// Pending on a decision that needs a human
    pub fn awaiting_human(&self) -> bool {
        self.resolution.is_pending() && self.decision.awaits_human()
    }

    /// Outcome for persistence, `None` while pending
    pub fn outcome(&self) -> Option<ResolvedOutcome> {
        match &self.resolution {
            UserResolution::Pending => None,
            UserResolution::Confirmed { record, .. } => Some(ResolvedOutcome::Existing {
                record_id: record.id,
                updates: None,
            }),
            UserResolution::RejectedCreateNew => Some(ResolvedOutcome::CreateNew {
                fields: ManualFields::from_entity(&self.entity),
            }),
            UserResolution::ManuallyCompleted {
                record_id: Some(record_id),
                fields,
            } => Some(ResolvedOutcome::Existing {
                record_id: *record_id,
                updates: Some(fields.clone()),
            }),
            UserResolution::ManuallyCompleted {
                record_id: None,
                fields,
            } => Some(ResolvedOutcome::CreateNew {
                fields: ManualFields::from_entity(&self.entity).overlay(fields),
            }),
        }
    }

    fn validate_choice(&self, choice: &UserChoice) -> ResolverResult<()> {
        match choice {
            UserChoice::Confirm { record_id } => {
                if self.decision.offers(*record_id).is_none() {
                    return Err(ResolverError::InvalidChoice(format!(
                        "record {} was not offered for {}",
                        record_id,
                        self.key()
                    )));
                }
            }
            UserChoice::RejectCreateNew => {
                if self.entity.raw_label.trim().is_empty() {
                    return Err(ResolverError::InvalidChoice(format!(
                        "label for {} is blank; supply a name by manual completion",
                        self.key()
                    )));
                }
            }
            UserChoice::ManuallyComplete { record_id, fields } => {
                fields.validate()?;
                match record_id {
                    Some(id) if self.decision.offers(*id).is_none() => {
                        return Err(ResolverError::InvalidChoice(format!(
                            "record {} was not offered for {}",
                            id,
                            self.key()
                        )));
                    }
                    None if fields.name.is_none() && self.entity.raw_label.trim().is_empty() => {
                        return Err(ResolverError::InvalidChoice(format!(
                            "a name is required to create {}",
                            self.key()
                        )));
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn resolution_for(&self, choice: UserChoice) -> ResolverResult<UserResolution> {
        Ok(match choice {
            UserChoice::Confirm { record_id } => {
                let candidate = self.decision.offers(record_id).ok_or_else(|| {
                    ResolverError::InvalidChoice(format!("record {} was not offered", record_id))
                })?;
                UserResolution::Confirmed {
                    record: candidate.record.clone(),
                    origin: ConfirmationOrigin::User,
                }
            }
            UserChoice::RejectCreateNew => UserResolution::RejectedCreateNew,
            UserChoice::ManuallyComplete { record_id, fields } => {
                UserResolution::ManuallyCompleted { record_id, fields }
            }
        })
    }
}

/// Aggregate resolution state for one submission batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisambiguationSession {
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: SessionStatus,
    /// Ordered by bottle index, brewery before beer
    pub entries: Vec<SessionEntry>,
}

impl DisambiguationSession {
    /// Create an Active session with a fresh identifier
    pub fn new(mut entries: Vec<SessionEntry>) -> Self {
        entries.sort_by_key(|e| e.key());
        let now = Utc::now();
        Self {
            session_id: SessionId::generate(),
            created_at: now,
            updated_at: now,
            status: SessionStatus::Active,
            entries,
        }
    }

    pub fn entry(&self, key: EntityKey) -> Option<&SessionEntry> {
        self.entries.iter().find(|e| e.key() == key)
    }

    fn entry_mut(&mut self, key: EntityKey) -> ResolverResult<&mut SessionEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.key() == key)
            .ok_or(ResolverError::EntityNotFound(key))
    }

    /// Entities pending on a ConfirmSingle or DisambiguateMulti decision
    pub fn awaiting_human(&self) -> usize {
        self.entries.iter().filter(|e| e.awaiting_human()).count()
    }

    /// Keys of entities still pending
    pub fn outstanding(&self) -> Vec<EntityKey> {
        self.entries
            .iter()
            .filter(|e| e.resolution.is_pending())
            .map(|e| e.key())
            .collect()
    }

    pub fn progress(&self) -> Progress {
        let total = self.entries.len();
        let outstanding = self.outstanding().len();
        Progress {
            total,
            resolved: total - outstanding,
            outstanding,
            awaiting_human: self.awaiting_human(),
            saved: self.entries.iter().filter(|e| e.is_saved()).count(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Committed | SessionStatus::Abandoned
        )
    }

    /// Unfinished and older than `ttl`
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        !self.is_terminal() && now - self.created_at >= ttl
    }

    pub fn ensure_active(&self) -> ResolverResult<()> {
        if self.status != SessionStatus::Active {
            return Err(ResolverError::InvalidTransition(format!(
                "session {} is {:?}, not Active",
                self.session_id, self.status
            )));
        }
        Ok(())
    }

    /// Apply a human choice to one entity
    ///
    /// An identical replay of the entity's current state is a no-op so that
    /// client retries are harmless.
    pub fn apply_choice(
        &mut self,
        key: EntityKey,
        choice: UserChoice,
    ) -> ResolverResult<ChoiceOutcome> {
        if self.status == SessionStatus::Abandoned {
            return Err(ResolverError::InvalidTransition(format!(
                "session {} was abandoned",
                self.session_id
            )));
        }

        let session_id = self.session_id.clone();
        let status = self.status;
        let entry = self.entry_mut(key)?;

        if entry.resolution.matches_choice(&choice) {
            return Ok(ChoiceOutcome::Unchanged);
        }

        if status != SessionStatus::Active {
            return Err(ResolverError::InvalidTransition(format!(
                "session {} is {:?}, not Active",
                session_id, status
            )));
        }

        if entry.is_saved() {
            return Err(ResolverError::InvalidTransition(format!(
                "{} was already saved",
                key
            )));
        }

        let overrode_auto_match = entry.resolution.is_automatic();
        if !entry.resolution.is_pending() && !overrode_auto_match {
            return Err(ResolverError::InvalidTransition(format!(
                "{} is already {}",
                key,
                entry.resolution.label()
            )));
        }

        entry.validate_choice(&choice)?;
        entry.resolution = entry.resolution_for(choice)?;
        self.updated_at = Utc::now();

        Ok(ChoiceOutcome::Applied {
            overrode_auto_match,
        })
    }

    /// Freeze choices for commit; fails while anything is pending
    ///
    /// Calling it again while already Committing is a no-op.
    pub fn begin_commit(&mut self) -> ResolverResult<()> {
        match self.status {
            SessionStatus::Committing => Ok(()),
            SessionStatus::Active => {
                let outstanding = self.outstanding().len();
                if outstanding > 0 {
                    return Err(ResolverError::IncompleteSession { outstanding });
                }
                self.status = SessionStatus::Committing;
                self.updated_at = Utc::now();
                Ok(())
            }
            other => Err(ResolverError::InvalidTransition(format!(
                "session {} is {:?}, cannot commit",
                self.session_id, other
            ))),
        }
    }

    /// Persistence failed; choices become editable again
    pub fn revert_commit(&mut self) {
        if self.status == SessionStatus::Committing {
            self.status = SessionStatus::Active;
            self.updated_at = Utc::now();
        }
    }

    pub fn finish_commit(&mut self) {
        self.status = SessionStatus::Committed;
        self.updated_at = Utc::now();
    }

    pub fn abandon(&mut self) -> ResolverResult<()> {
        match self.status {
            SessionStatus::Committed => Err(ResolverError::InvalidTransition(format!(
                "session {} is already committed",
                self.session_id
            ))),
            _ => {
                self.status = SessionStatus::Abandoned;
                self.updated_at = Utc::now();
                Ok(())
            }
        }
    }

    /// Resolved entries not yet persisted
    ///
    /// Beers whose brewery on the same bottle is still pending are held back
    /// until that brewery is resolved, so they are never saved unlinked.
    pub fn unsaved_batch(&self) -> ResolvedBatch {
        let entities = self
            .entries
            .iter()
            .filter(|e| !e.is_saved() && !self.awaits_brewery(e))
            .filter_map(|entry| {
                let outcome = entry.outcome()?;
                let brewery = match entry.entity.kind {
                    EntityKind::Beer => self.brewery_ref_for(entry),
                    EntityKind::Brewery => None,
                };
                Some(ResolvedEntity {
                    key: entry.key(),
                    raw_label: entry.entity.raw_label.clone(),
                    outcome,
                    brewery,
                })
            })
            .collect();

        ResolvedBatch {
            session_id: self.session_id.clone(),
            entities,
        }
    }

    /// Resolved but unsaved entries held back by [`Self::unsaved_batch`]
    pub fn deferred(&self) -> Vec<EntityKey> {
        self.entries
            .iter()
            .filter(|e| !e.is_saved() && !e.resolution.is_pending() && self.awaits_brewery(e))
            .map(|e| e.key())
            .collect()
    }

    fn awaits_brewery(&self, entry: &SessionEntry) -> bool {
        entry.entity.kind == EntityKind::Beer
            && self
                .entry(EntityKey::new(entry.entity.bottle_index, EntityKind::Brewery))
                .is_some_and(|brewery| !brewery.is_saved() && brewery.resolution.is_pending())
    }

    fn brewery_ref_for(&self, beer: &SessionEntry) -> Option<BreweryRef> {
        let label_hint = beer
            .entity
            .auxiliary
            .brewery_id
            .map(|record_id| BreweryRef::Existing { record_id });

        let Some(brewery) = self.entry(EntityKey::new(beer.entity.bottle_index, EntityKind::Brewery))
        else {
            return label_hint;
        };

        if let Some(record_id) = brewery.saved_record_id {
            return Some(BreweryRef::Existing { record_id });
        }

        match brewery.outcome() {
            Some(ResolvedOutcome::Existing { record_id, .. }) => {
                Some(BreweryRef::Existing { record_id })
            }
            Some(ResolvedOutcome::CreateNew { .. }) => Some(BreweryRef::InBatch {
                key: brewery.key(),
            }),
            None => label_hint,
        }
    }

    /// Record which entries persistence accepted and the ids it assigned
    pub fn mark_saved(&mut self, keys: &[EntityKey], assigned: &HashMap<EntityKey, Uuid>) {
        let now = Utc::now();
        for entry in self.entries.iter_mut().filter(|e| keys.contains(&e.key())) {
            let existing_id = match entry.outcome() {
                Some(ResolvedOutcome::Existing { record_id, .. }) => Some(record_id),
                _ => None,
            };
            entry.saved_record_id = assigned.get(&entry.key()).copied().or(existing_id);
            entry.saved_at = Some(now);
        }
        self.updated_at = now;
    }
}
