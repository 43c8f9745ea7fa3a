//! Resolver event types and broadcast bus
//!
//! Events describe session lifecycle and monitoring signals. They are
//! broadcast via [`EventBus`] and serialize with a `type` tag so they can be
//! forwarded to a UI or metrics collector unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Resolver event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResolverEvent {
    /// A disambiguation session was created from an analysis batch
    SessionStarted {
        session_id: String,
        entity_count: usize,
        /// Entities needing a human response
        awaiting_human: usize,
        timestamp: DateTime<Utc>,
    },

    /// Classifier fell back to multi-candidate disambiguation
    ///
    /// Not an error. Tracked to monitor false-ambiguity rates.
    AmbiguousMatchFallback {
        session_id: String,
        bottle_index: usize,
        kind: String,
        candidate_count: usize,
        top_similarity: f64,
        timestamp: DateTime<Utc>,
    },

    /// A human choice was applied to an entity
    ChoiceRecorded {
        session_id: String,
        bottle_index: usize,
        kind: String,
        /// "confirmed", "rejected_create_new" or "manually_completed"
        resolution: String,
        /// True when the choice replaced an automatic match
        overrode_auto_match: bool,
        timestamp: DateTime<Utc>,
    },

    /// Verified entities were persisted, others left outstanding
    PartialSaveCompleted {
        session_id: String,
        saved: usize,
        outstanding: usize,
        timestamp: DateTime<Utc>,
    },

    /// Whole session persisted
    SessionCommitted {
        session_id: String,
        entity_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Persistence collaborator rejected a commit; session stays active
    CommitFailed {
        session_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// Session discarded before commit
    SessionAbandoned {
        session_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Cleanup request refused because human work is in progress
    CleanupRefused {
        session_id: String,
        reason: String,
        awaiting_human: usize,
        timestamp: DateTime<Utc>,
    },
}

impl ResolverEvent {
    /// Variant name, used as the SSE event type
    pub fn event_type(&self) -> &'static str {
        match self {
            ResolverEvent::SessionStarted { .. } => "SessionStarted",
            ResolverEvent::AmbiguousMatchFallback { .. } => "AmbiguousMatchFallback",
            ResolverEvent::ChoiceRecorded { .. } => "ChoiceRecorded",
            ResolverEvent::PartialSaveCompleted { .. } => "PartialSaveCompleted",
            ResolverEvent::SessionCommitted { .. } => "SessionCommitted",
            ResolverEvent::CommitFailed { .. } => "CommitFailed",
            ResolverEvent::SessionAbandoned { .. } => "SessionAbandoned",
            ResolverEvent::CleanupRefused { .. } => "CleanupRefused",
        }
    }

    /// Session the event belongs to
    pub fn session_id(&self) -> &str {
        match self {
            ResolverEvent::SessionStarted { session_id, .. }
            | ResolverEvent::AmbiguousMatchFallback { session_id, .. }
            | ResolverEvent::ChoiceRecorded { session_id, .. }
            | ResolverEvent::PartialSaveCompleted { session_id, .. }
            | ResolverEvent::SessionCommitted { session_id, .. }
            | ResolverEvent::CommitFailed { session_id, .. }
            | ResolverEvent::SessionAbandoned { session_id, .. }
            | ResolverEvent::CleanupRefused { session_id, .. } => session_id,
        }
    }
}

/// Broadcast bus for [`ResolverEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ResolverEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered before the oldest are
    /// dropped for slow subscribers.
    ///
    /// ```
    /// use brewid_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ResolverEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ResolverEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
