//! Read-only projections of a session for the UI collaborator
//!
//! Every non-automatic decision carries its candidates with similarity,
//! keyword flag and auxiliary signals so the UI can explain it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::decision::ResolutionDecision;
use super::entity::{EntityKind, MissingField};
use super::session::{DisambiguationSession, SessionEntry, SessionId, SessionStatus, UserResolution};

/// Progress counts for display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub total: usize,
    /// Entities no longer pending
    pub resolved: usize,
    pub outstanding: usize,
    /// Pending entities that block commit and cleanup
    pub awaiting_human: usize,
    /// Entities already persisted by a partial save
    pub saved: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryView {
    pub bottle_index: usize,
    pub kind: EntityKind,
    pub raw_label: String,
    pub decision: ResolutionDecision,
    pub resolution: UserResolution,
    pub awaiting_human: bool,
    pub saved: bool,
    pub saved_record_id: Option<Uuid>,
    pub missing_fields: Vec<MissingField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub progress: Progress,
    pub entries: Vec<EntryView>,
}

impl From<&SessionEntry> for EntryView {
    fn from(entry: &SessionEntry) -> Self {
        Self {
            bottle_index: entry.entity.bottle_index,
            kind: entry.entity.kind,
            raw_label: entry.entity.raw_label.clone(),
            decision: entry.decision.clone(),
            resolution: entry.resolution.clone(),
            awaiting_human: entry.awaiting_human(),
            saved: entry.is_saved(),
            saved_record_id: entry.saved_record_id,
            missing_fields: entry.entity.missing_fields(),
        }
    }
}

impl From<&DisambiguationSession> for SessionView {
    fn from(session: &DisambiguationSession) -> Self {
        Self {
            session_id: session.session_id.clone(),
            status: session.status,
            created_at: session.created_at,
            updated_at: session.updated_at,
            progress: session.progress(),
            entries: session.entries.iter().map(EntryView::from).collect(),
        }
    }
}
