//! Document store
//!
//! The secondary store holding one [`DocumentRecord`] per property id.
//! Writes go through [`DocumentSink`] (full replace); reads through
//! [`DocumentStore`].

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::readmodel::document::{DocumentRecord, PropertyDocument};

/// Default page size for searches.
pub const DEFAULT_PAGE_SIZE: usize = 20;
/// Upper bound on requested page sizes.
pub const MAX_PAGE_SIZE: usize = 100;

/// Upsert target for synchronized documents.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Inserts or wholly replaces the document for `property_id`.
    async fn upsert_property_document(&self, property_id: &str, doc: &PropertyDocument) -> Result<()>;
}

/// Filters accepted by [`DocumentStore::search_property_documents`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    /// City, matched case-insensitively
    pub zone: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    /// Case-insensitive substring of title or description
    pub q: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub results: Vec<PropertyDocument>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
}

#[async_trait]
pub trait DocumentStore: DocumentSink {
    async fn get_property_document(&self, property_id: &str) -> Result<Option<PropertyDocument>>;

    /// Filtered page of documents; `page` is 1-based.
    async fn search_property_documents(
        &self,
        filters: &SearchFilters,
        page: usize,
        page_size: usize,
    ) -> Result<SearchPage>;
}

// == Memory Document Store ==
/// Document store kept in process memory, namespaced by database name.
#[derive(Debug)]
pub struct MemoryDocumentStore {
    database: String,
    records: RwLock<HashMap<String, DocumentRecord>>,
}

impl MemoryDocumentStore {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Full stored record, including `updated_at`.
    pub async fn record(&self, property_id: &str) -> Option<DocumentRecord> {
        self.records.read().await.get(property_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentSink for MemoryDocumentStore {
    async fn upsert_property_document(&self, property_id: &str, doc: &PropertyDocument) -> Result<()> {
        let record = DocumentRecord {
            property_id: property_id.to_string(),
            doc: doc.clone(),
            updated_at: Utc::now(),
        };
        self.records.write().await.insert(property_id.to_string(), record);
        debug!(database = %self.database, property_id = property_id, "Upserted property document");
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_property_document(&self, property_id: &str) -> Result<Option<PropertyDocument>> {
        Ok(self.records.read().await.get(property_id).map(|r| r.doc.clone()))
    }

    async fn search_property_documents(
        &self,
        filters: &SearchFilters,
        page: usize,
        page_size: usize,
    ) -> Result<SearchPage> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);

        let records = self.records.read().await;
        let mut matching: Vec<&DocumentRecord> = records
            .values()
            .filter(|record| matches_filters(&record.doc, filters))
            .collect();
        // Newest first, id as tie-breaker for stable paging
        matching.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.property_id.cmp(&b.property_id))
        });

        let total = matching.len();
        let results = matching
            .into_iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .map(|record| record.doc.clone())
            .collect();

        Ok(SearchPage {
            results,
            page,
            page_size,
            total,
        })
    }
}

fn matches_filters(doc: &PropertyDocument, filters: &SearchFilters) -> bool {
    if let Some(zone) = filters.zone.as_deref() {
        let city = doc.neighborhood.city.as_deref().unwrap_or_default();
        if !city.eq_ignore_ascii_case(zone.trim()) {
            return false;
        }
    }
    if let Some(min) = filters.min_price {
        if doc.price.map_or(true, |price| price < min) {
            return false;
        }
    }
    if let Some(max) = filters.max_price {
        if doc.price.map_or(true, |price| price > max) {
            return false;
        }
    }
    if let Some(q) = filters.q.as_deref().map(str::to_lowercase).filter(|q| !q.is_empty()) {
        let in_title = doc.title.to_lowercase().contains(&q);
        let in_description = doc
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(&q));
        if !in_title && !in_description {
            return false;
        }
    }
    true
}
