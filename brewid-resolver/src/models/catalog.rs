//! Catalog records as supplied by the catalog collaborator
//!
//! Read-only from the resolver's point of view.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entity::EntityKind;

/// An existing brewery or beer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub id: Uuid,
    pub kind: EntityKind,
    pub name: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    /// Owning brewery (beers only)
    #[serde(default)]
    pub brewery_id: Option<Uuid>,
    #[serde(default)]
    pub beer_type: Option<String>,
    #[serde(default)]
    pub abv: Option<f64>,
}

impl CatalogRecord {
    pub fn brewery(name: impl Into<String>) -> Self {
        Self::new(EntityKind::Brewery, name)
    }

    pub fn beer(name: impl Into<String>, brewery_id: Option<Uuid>) -> Self {
        Self {
            brewery_id,
            ..Self::new(EntityKind::Beer, name)
        }
    }

    fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            name: name.into(),
            website: None,
            email: None,
            address: None,
            brewery_id: None,
            beer_type: None,
            abv: None,
        }
    }

    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = Some(website.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_beer_type(mut self, beer_type: impl Into<String>) -> Self {
        self.beer_type = Some(beer_type.into());
        self
    }

    pub fn with_abv(mut self, abv: f64) -> Self {
        self.abv = Some(abv);
        self
    }
}
