//! Resolved entities handed to the persistence collaborator

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entity::EntityKey;
use super::session::{ManualFields, SessionId};

/// How a beer links to its brewery at commit time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "ref", rename_all = "snake_case")]
pub enum BreweryRef {
    /// Brewery already in the catalog
    Existing { record_id: Uuid },
    /// Brewery created by another entry of the same batch
    InBatch { key: EntityKey },
}

/// Final outcome for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResolvedOutcome {
    /// Points at an existing record, optionally filling gaps in it
    Existing {
        record_id: Uuid,
        updates: Option<ManualFields>,
    },
    /// A new record built from label data and/or manual input
    CreateNew { fields: ManualFields },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEntity {
    pub key: EntityKey,
    pub raw_label: String,
    pub outcome: ResolvedOutcome,
    /// Set for beers whose brewery on the same bottle is resolved
    pub brewery: Option<BreweryRef>,
}

/// Everything one commit round hands to persistence; expected to apply atomically
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedBatch {
    pub session_id: SessionId,
    pub entities: Vec<ResolvedEntity>,
}

impl ResolvedBatch {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn keys(&self) -> Vec<EntityKey> {
        self.entities.iter().map(|e| e.key).collect()
    }
}
