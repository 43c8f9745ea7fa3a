//! Entities extracted from bottle photos by the upstream AI/OCR service

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// What an extracted label names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Brewery,
    Beer,
}

impl EntityKind {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Brewery => "brewery",
            EntityKind::Beer => "beer",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured hints read off the label
///
/// Used only as matching signals, never assumed correct.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuxiliaryFields {
    pub website: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
    pub beer_type: Option<String>,
    /// Alcohol by volume, percent
    pub abv: Option<f64>,
    /// Brewery already known for this beer (e.g. resolved earlier)
    pub brewery_id: Option<Uuid>,
}

/// One item produced by the AI/OCR step for a photographed bottle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub kind: EntityKind,
    /// Free text as extracted, may contain OCR noise
    pub raw_label: String,
    #[serde(default)]
    pub auxiliary: AuxiliaryFields,
    /// Position of the bottle within the submission batch
    pub bottle_index: usize,
}

/// Address of an entity inside a session
///
/// A single bottle yields up to one brewery and one beer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub bottle_index: usize,
    pub kind: EntityKind,
}

impl EntityKey {
    pub fn new(bottle_index: usize, kind: EntityKind) -> Self {
        Self { bottle_index, kind }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bottle {} {}", self.bottle_index, self.kind)
    }
}

/// Field a new or matched catalog entry still lacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingField {
    Name,
    Website,
    BeerType,
    Abv,
}

impl ExtractedEntity {
    pub fn new(kind: EntityKind, raw_label: impl Into<String>, bottle_index: usize) -> Self {
        Self {
            kind,
            raw_label: raw_label.into(),
            auxiliary: AuxiliaryFields::default(),
            bottle_index,
        }
    }

    pub fn brewery(raw_label: impl Into<String>, bottle_index: usize) -> Self {
        Self::new(EntityKind::Brewery, raw_label, bottle_index)
    }

    pub fn beer(raw_label: impl Into<String>, bottle_index: usize) -> Self {
        Self::new(EntityKind::Beer, raw_label, bottle_index)
    }

    pub fn with_auxiliary(mut self, auxiliary: AuxiliaryFields) -> Self {
        self.auxiliary = auxiliary;
        self
    }

    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.bottle_index, self.kind)
    }

    /// Fields a record created from this entity would be missing
    pub fn missing_fields(&self) -> Vec<MissingField> {
        let mut missing = Vec::new();
        if self.raw_label.trim().is_empty() {
            missing.push(MissingField::Name);
        }
        match self.kind {
            EntityKind::Brewery => {
                if self.auxiliary.website.is_none() {
                    missing.push(MissingField::Website);
                }
            }
            EntityKind::Beer => {
                if self.auxiliary.beer_type.is_none() {
                    missing.push(MissingField::BeerType);
                }
                if self.auxiliary.abv.is_none() {
                    missing.push(MissingField::Abv);
                }
            }
        }
        missing
    }
}
