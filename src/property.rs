//! Canonical property rows
//!
//! Shapes of the relational rows handed to the cache core by callers. The
//! relational store itself lives elsewhere; only the fields the key builder
//! and the read-model projection need are modelled.

use serde::{Deserialize, Serialize};

/// `operation_status_id` for listings offered for sale.
pub const OPERATION_SALE: i64 = 1;
/// `operation_status_id` for listings offered for rent.
pub const OPERATION_RENT: i64 = 2;

/// One row of the `properties` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyRow {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub square_meters: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub seller_id: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub neighborhood: Option<String>,
    #[serde(default)]
    pub operation_status_id: Option<i64>,
    #[serde(default)]
    pub bedrooms: Option<i64>,
    #[serde(default)]
    pub property_type: Option<String>,
}

impl PropertyRow {
    /// Operation slug used in cache keys: `sale`, `rent`, or none.
    pub fn operation_slug(&self) -> Option<&'static str> {
        match self.operation_status_id {
            Some(OPERATION_SALE) => Some("sale"),
            Some(OPERATION_RENT) => Some("rent"),
            _ => None,
        }
    }
}

/// One row of `property_images`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyImage {
    pub url: String,
    #[serde(default)]
    pub position: Option<i32>,
    #[serde(default)]
    pub alt: Option<String>,
}

/// One feature attached to a property (e.g. "pool").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyFeature {
    pub name: String,
}
