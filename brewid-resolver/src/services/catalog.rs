//! Catalog collaborators
//!
//! [`CatalogSource`] supplies candidate records for matching; it is a
//! read-only snapshot and never awaited. [`CatalogCommitter`] persists a
//! resolved batch and is the only await point in the engine.
//!
//! [`MemoryCatalog`] implements both over an in-process record list, seeded
//! from a JSON snapshot.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::RwLock;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    BreweryRef, CatalogRecord, EntityKey, EntityKind, ManualFields, ResolvedBatch, ResolvedEntity,
    ResolvedOutcome,
};

/// Candidate supplier
pub trait CatalogSource: Send + Sync {
    /// Records of `kind` worth scoring against `name_hint`
    ///
    /// Implementations may pre-filter by the hint but must not drop records
    /// that could share a keyword with it; returning every record of the kind
    /// is always correct.
    fn list_candidates(&self, kind: EntityKind, name_hint: &str) -> Vec<CatalogRecord>;
}

impl CatalogSource for Vec<CatalogRecord> {
    fn list_candidates(&self, kind: EntityKind, _name_hint: &str) -> Vec<CatalogRecord> {
        self.iter().filter(|r| r.kind == kind).cloned().collect()
    }
}

/// Persistence failure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommitError {
    /// Transient: the caller may retry
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
    /// Batch refused as a whole, nothing applied
    #[error("batch rejected: {0}")]
    Rejected(String),
}

/// Ids of the records each committed entity now points at
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitReceipt {
    pub record_ids: HashMap<EntityKey, Uuid>,
}

/// Persistence collaborator
///
/// A batch is applied atomically: either every entity is persisted or none.
#[async_trait]
pub trait CatalogCommitter: Send + Sync {
    async fn commit_resolved_entities(
        &self,
        batch: &ResolvedBatch,
    ) -> Result<CommitReceipt, CommitError>;
}

/// In-memory catalog
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    records: RwLock<Vec<CatalogRecord>>,
}

impl MemoryCatalog {
    pub fn new(records: Vec<CatalogRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Load a JSON array of [`CatalogRecord`]s
    pub fn from_json_file(path: &Path) -> brewid_common::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let records: Vec<CatalogRecord> = serde_json::from_str(&content).map_err(|e| {
            brewid_common::Error::InvalidInput(format!(
                "Failed to parse catalog {}: {}",
                path.display(),
                e
            ))
        })?;
        info!(path = %path.display(), records = records.len(), "Catalog snapshot loaded");
        Ok(Self::new(records))
    }

    /// Copy of every record
    pub fn snapshot(&self) -> Vec<CatalogRecord> {
        self.read().clone()
    }

    pub fn get(&self, id: Uuid) -> Option<CatalogRecord> {
        self.read().iter().find(|r| r.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<CatalogRecord>> {
        self.records.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<CatalogRecord>> {
        self.records.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Check the whole batch before touching anything
    fn validate(records: &[CatalogRecord], batch: &ResolvedBatch) -> Result<(), CommitError> {
        let known: HashSet<Uuid> = records.iter().map(|r| r.id).collect();
        let created: HashSet<EntityKey> = batch
            .entities
            .iter()
            .filter(|e| matches!(e.outcome, ResolvedOutcome::CreateNew { .. }))
            .map(|e| e.key)
            .collect();

        for entity in &batch.entities {
            match &entity.outcome {
                ResolvedOutcome::Existing { record_id, .. } if !known.contains(record_id) => {
                    return Err(CommitError::Rejected(format!(
                        "{} points at unknown record {}",
                        entity.key, record_id
                    )));
                }
                ResolvedOutcome::CreateNew { fields } => {
                    if fields.name.as_deref().map_or(true, |n| n.trim().is_empty()) {
                        return Err(CommitError::Rejected(format!(
                            "{} has no name for the new record",
                            entity.key
                        )));
                    }
                }
                _ => {}
            }

            match entity.brewery {
                Some(BreweryRef::Existing { record_id }) if !known.contains(&record_id) => {
                    return Err(CommitError::Rejected(format!(
                        "{} links to unknown brewery {}",
                        entity.key, record_id
                    )));
                }
                Some(BreweryRef::InBatch { key }) if !created.contains(&key) => {
                    return Err(CommitError::Rejected(format!(
                        "{} links to {} which is not created in this batch",
                        entity.key, key
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl CatalogSource for MemoryCatalog {
    fn list_candidates(&self, kind: EntityKind, _name_hint: &str) -> Vec<CatalogRecord> {
        self.read()
            .iter()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CatalogCommitter for MemoryCatalog {
    async fn commit_resolved_entities(
        &self,
        batch: &ResolvedBatch,
    ) -> Result<CommitReceipt, CommitError> {
        let mut records = self.write();
        Self::validate(&records, batch)?;

        // Breweries first so beers can link to breweries created in this batch
        let mut ordered: Vec<&ResolvedEntity> = batch.entities.iter().collect();
        ordered.sort_by_key(|e| (e.key.kind != EntityKind::Brewery, e.key));

        let mut receipt = CommitReceipt::default();
        for entity in ordered {
            let brewery_id = match entity.brewery {
                Some(BreweryRef::Existing { record_id }) => Some(record_id),
                Some(BreweryRef::InBatch { key }) => receipt.record_ids.get(&key).copied(),
                None => None,
            };

            let id = match &entity.outcome {
                ResolvedOutcome::Existing { record_id, updates } => {
                    if let Some(record) = records.iter_mut().find(|r| r.id == *record_id) {
                        if let Some(updates) = updates {
                            fill_gaps(record, updates);
                        }
                        if record.brewery_id.is_none() {
                            record.brewery_id = brewery_id;
                        }
                    }
                    *record_id
                }
                ResolvedOutcome::CreateNew { fields } => {
                    let record = new_record(entity.key.kind, fields, brewery_id);
                    let id = record.id;
                    records.push(record);
                    id
                }
            };
            receipt.record_ids.insert(entity.key, id);
        }

        debug!(
            session_id = %batch.session_id,
            entities = batch.len(),
            catalog_size = records.len(),
            "Batch applied to memory catalog"
        );
        Ok(receipt)
    }
}

/// Only empty fields of an existing record are filled
fn fill_gaps(record: &mut CatalogRecord, updates: &ManualFields) {
    fn fill(slot: &mut Option<String>, value: &Option<String>) {
        if slot.is_none() {
            slot.clone_from(value);
        }
    }
    fill(&mut record.website, &updates.website);
    fill(&mut record.email, &updates.email);
    fill(&mut record.address, &updates.address);
    fill(&mut record.beer_type, &updates.beer_type);
    if record.abv.is_none() {
        record.abv = updates.abv;
    }
}

fn new_record(kind: EntityKind, fields: &ManualFields, brewery_id: Option<Uuid>) -> CatalogRecord {
    CatalogRecord {
        id: Uuid::new_v4(),
        kind,
        name: fields.name.clone().unwrap_or_default().trim().to_string(),
        website: fields.website.clone(),
        email: fields.email.clone(),
        address: fields.address.clone(),
        brewery_id: if kind == EntityKind::Beer { brewery_id } else { None },
        beer_type: fields.beer_type.clone(),
        abv: fields.abv,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionId;

    fn create(key: EntityKey, name: &str, brewery: Option<BreweryRef>) -> ResolvedEntity {
        ResolvedEntity {
            key,
            raw_label: name.to_string(),
            outcome: ResolvedOutcome::CreateNew {
                fields: ManualFields {
                    name: Some(name.to_string()),
                    ..Default::default()
                },
            },
            brewery,
        }
    }

    #[tokio::test]
    async fn creates_brewery_and_linked_beer() {
        let catalog = MemoryCatalog::default();
        let brewery_key = EntityKey::new(0, EntityKind::Brewery);
        let beer_key = EntityKey::new(0, EntityKind::Beer);
        let batch = ResolvedBatch {
            session_id: SessionId::from("s"),
            // Beer listed first on purpose
            entities: vec![
                create(beer_key, "Nuova Bionda", Some(BreweryRef::InBatch { key: brewery_key })),
                create(brewery_key, "Birrificio Nuovo", None),
            ],
        };

        let receipt = catalog.commit_resolved_entities(&batch).await.unwrap();
        assert_eq!(catalog.len(), 2);

        let brewery_id = receipt.record_ids[&brewery_key];
        let beer = catalog.get(receipt.record_ids[&beer_key]).unwrap();
        assert_eq!(beer.brewery_id, Some(brewery_id));
        assert_eq!(beer.kind, EntityKind::Beer);
    }

    #[tokio::test]
    async fn rejected_batch_applies_nothing() {
        let catalog = MemoryCatalog::new(vec![CatalogRecord::brewery("Baladin")]);
        let batch = ResolvedBatch {
            session_id: SessionId::from("s"),
            entities: vec![
                create(EntityKey::new(0, EntityKind::Brewery), "Birrificio Nuovo", None),
                ResolvedEntity {
                    key: EntityKey::new(1, EntityKind::Brewery),
                    raw_label: "Ghost".to_string(),
                    outcome: ResolvedOutcome::Existing {
                        record_id: Uuid::new_v4(),
                        updates: None,
                    },
                    brewery: None,
                },
            ],
        };

        let result = catalog.commit_resolved_entities(&batch).await;
        assert!(matches!(result, Err(CommitError::Rejected(_))));
        assert_eq!(catalog.len(), 1);
    }

    #[tokio::test]
    async fn updates_fill_only_empty_fields() {
        let existing = CatalogRecord::brewery("Baladin").with_website("baladin.it");
        let id = existing.id;
        let catalog = MemoryCatalog::new(vec![existing]);
        let batch = ResolvedBatch {
            session_id: SessionId::from("s"),
            entities: vec![ResolvedEntity {
                key: EntityKey::new(0, EntityKind::Brewery),
                raw_label: "Baladin".to_string(),
                outcome: ResolvedOutcome::Existing {
                    record_id: id,
                    updates: Some(ManualFields {
                        website: Some("other.example".to_string()),
                        email: Some("info@baladin.it".to_string()),
                        ..Default::default()
                    }),
                },
                brewery: None,
            }],
        };

        catalog.commit_resolved_entities(&batch).await.unwrap();
        let record = catalog.get(id).unwrap();
        assert_eq!(record.website.as_deref(), Some("baladin.it"));
        assert_eq!(record.email.as_deref(), Some("info@baladin.it"));
    }

    #[test]
    fn source_filters_by_kind() {
        let catalog = MemoryCatalog::new(vec![
            CatalogRecord::brewery("Baladin"),
            CatalogRecord::beer("Isaac", None),
        ]);
        let breweries = catalog.list_candidates(EntityKind::Brewery, "anything");
        assert_eq!(breweries.len(), 1);
        assert_eq!(breweries[0].name, "Baladin");
    }

    #[test]
    fn loads_json_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let records = vec![CatalogRecord::brewery("Baladin").with_website("baladin.it")];
        std::fs::write(&path, serde_json::to_string(&records).unwrap()).unwrap();

        let catalog = MemoryCatalog::from_json_file(&path).unwrap();
        assert_eq!(catalog.snapshot(), records);
    }

    #[test]
    fn malformed_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(MemoryCatalog::from_json_file(&path).is_err());
    }
}
