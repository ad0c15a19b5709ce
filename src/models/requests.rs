//! Request DTOs for the listing cache API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;

use crate::property::{PropertyFeature, PropertyImage, PropertyRow};
use crate::readmodel::{SearchFilters, DEFAULT_PAGE_SIZE};

/// Request body for `POST /sync/property`
#[derive(Debug, Clone, Deserialize)]
pub struct SyncRequest {
    /// Canonical property row
    pub property: PropertyRow,
    /// Image rows, in display order
    #[serde(default)]
    pub images: Vec<PropertyImage>,
    /// Feature rows
    #[serde(default)]
    pub features: Vec<PropertyFeature>,
}

impl SyncRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.property.id.trim().is_empty() {
            return Some("Property id cannot be empty".to_string());
        }
        None
    }
}

/// Request body for `POST /admin/cache/invalidate`
///
/// Either a raw `pattern`, or a `property` whose invalidation set is
/// computed server-side (`coarse` selects the image-change set).
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub property: Option<PropertyRow>,
    #[serde(default)]
    pub coarse: bool,
}

impl InvalidateRequest {
    pub fn validate(&self) -> Option<String> {
        match (&self.pattern, &self.property) {
            (Some(_), Some(_)) => Some("Provide either a pattern or a property, not both".to_string()),
            (None, None) => Some("Provide a pattern or a property".to_string()),
            (Some(pattern), None) if pattern.trim().is_empty() => {
                Some("Pattern cannot be empty".to_string())
            }
            (None, Some(property)) if property.id.trim().is_empty() => {
                Some("Property id cannot be empty".to_string())
            }
            _ => None,
        }
    }
}

/// Query string for `GET /properties`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    pub zone: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub q: Option<String>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl SearchQuery {
    /// Parsed document-store filters; prices must be numbers.
    pub fn filters(&self) -> Result<SearchFilters, String> {
        let min_price = parse_price("min_price", self.min_price.as_deref())?;
        let max_price = parse_price("max_price", self.max_price.as_deref())?;
        if let (Some(min), Some(max)) = (min_price, max_price) {
            if min > max {
                return Err("min_price cannot exceed max_price".to_string());
            }
        }

        Ok(SearchFilters {
            zone: self.zone.clone().filter(|z| !z.trim().is_empty()),
            min_price,
            max_price,
            q: self.q.clone().filter(|q| !q.trim().is_empty()),
        })
    }

    pub fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    pub fn page_size(&self) -> usize {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// Name/value pairs that identify this query in a cache key.
    pub fn cache_filters(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        for (name, value) in [
            ("zone", &self.zone),
            ("min_price", &self.min_price),
            ("max_price", &self.max_price),
            ("q", &self.q),
        ] {
            if let Some(value) = value {
                pairs.push((name, value.clone()));
            }
        }
        if self.page() != 1 {
            pairs.push(("page", self.page().to_string()));
        }
        if self.page_size() != DEFAULT_PAGE_SIZE {
            pairs.push(("page_size", self.page_size().to_string()));
        }
        pairs
    }
}

fn parse_price(name: &str, value: Option<&str>) -> Result<Option<f64>, String> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse::<f64>()
            .ok()
            .filter(|p| p.is_finite())
            .map(Some)
            .ok_or_else(|| format!("{} must be a number", name)),
    }
}
