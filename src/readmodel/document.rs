//! Read-model document
//!
//! Flattened projection of one property, its images and its features.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::property::{PropertyFeature, PropertyRow};

/// Maximum summary length, in characters.
pub const SUMMARY_MAX_CHARS: usize = 240;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Neighborhood {
    pub name: Option<String>,
    pub city: Option<String>,
}

/// Denormalized listing as served by search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDocument {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub features: Vec<String>,
    pub images: Vec<String>,
    pub neighborhood: Neighborhood,
    pub price: Option<f64>,
    pub price_per_m2: Option<i64>,
    pub currency: String,
}

/// Stored form: one record per property id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub property_id: String,
    pub doc: PropertyDocument,
    pub updated_at: DateTime<Utc>,
}

impl PropertyDocument {
    /// Projects `property` using already-resolved image URLs.
    pub fn build(
        property: &PropertyRow,
        image_urls: Vec<String>,
        features: &[PropertyFeature],
        default_currency: &str,
    ) -> Self {
        Self {
            id: property.id.clone(),
            title: property.title.clone(),
            description: property.description.clone(),
            summary: summarize(property.description.as_deref()),
            features: features.iter().map(|f| f.name.clone()).collect(),
            images: image_urls,
            neighborhood: Neighborhood {
                name: property.neighborhood.clone(),
                city: property.city.clone(),
            },
            price: property.price,
            price_per_m2: price_per_area(property.price, property.square_meters),
            currency: property
                .currency
                .clone()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| default_currency.to_string()),
        }
    }
}

/// First [`SUMMARY_MAX_CHARS`] characters of the description.
pub fn summarize(description: Option<&str>) -> Option<String> {
    description
        .filter(|d| !d.is_empty())
        .map(|d| d.chars().take(SUMMARY_MAX_CHARS).collect())
}

/// `round(price / area)` when both are present and non-zero.
pub fn price_per_area(price: Option<f64>, area: Option<f64>) -> Option<i64> {
    match (price, area) {
        (Some(price), Some(area)) if price != 0.0 && area != 0.0 => {
            let ratio = price / area;
            ratio.is_finite().then(|| ratio.round() as i64)
        }
        _ => None,
    }
}
