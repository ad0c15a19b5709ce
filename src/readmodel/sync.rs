//! Read-model synchronizer
//!
//! Rebuilds a property's document from its canonical rows, upserts it, then
//! invalidates the cache entries that could show the old version.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::{CacheKeys, CacheStore, InvalidationScope};
use crate::error::Result;
use crate::property::{PropertyFeature, PropertyImage, PropertyRow};
use crate::readmodel::document::PropertyDocument;
use crate::readmodel::resolver::ImageResolver;
use crate::readmodel::store::DocumentSink;

/// Cache operations the synchronizer needs.
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    async fn delete_key(&self, key: &str) -> Result<()>;
    async fn invalidate_pattern(&self, pattern: &str) -> Result<()>;
}

#[async_trait]
impl CacheInvalidator for CacheStore {
    async fn delete_key(&self, key: &str) -> Result<()> {
        self.delete(key).await;
        Ok(())
    }

    async fn invalidate_pattern(&self, pattern: &str) -> Result<()> {
        CacheStore::invalidate_pattern(self, pattern).await;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncOutcome {
    pub ok: bool,
    pub doc: PropertyDocument,
}

// == Read Model Synchronizer ==
#[derive(Clone)]
pub struct ReadModelSynchronizer {
    resolver: Arc<dyn ImageResolver>,
    sink: Arc<dyn DocumentSink>,
    invalidator: Arc<dyn CacheInvalidator>,
    keys: CacheKeys,
    default_currency: String,
}

impl ReadModelSynchronizer {
    pub fn new(
        resolver: Arc<dyn ImageResolver>,
        sink: Arc<dyn DocumentSink>,
        invalidator: Arc<dyn CacheInvalidator>,
        keys: CacheKeys,
        default_currency: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            sink,
            invalidator,
            keys,
            default_currency: default_currency.into(),
        }
    }

    // == Build And Upsert ==
    /// Projects, stores and invalidates one property.
    ///
    /// Image resolution and cache invalidation are best-effort per item; only
    /// a failed upsert fails the sync.
    pub async fn build_and_upsert(
        &self,
        property: &PropertyRow,
        images: &[PropertyImage],
        features: &[PropertyFeature],
    ) -> Result<SyncOutcome> {
        let mut image_urls = Vec::with_capacity(images.len());
        for image in images {
            let url = match self.resolver.resolve(&image.url).await {
                Ok(resolved) => resolved,
                Err(e) => {
                    warn!(property_id = %property.id, url = %image.url, error = %e, "Image URL resolution failed, keeping original");
                    image.url.clone()
                }
            };
            image_urls.push(url);
        }

        let doc = PropertyDocument::build(property, image_urls, features, &self.default_currency);
        self.sink.upsert_property_document(&property.id, &doc).await?;

        let property_key = self.keys.property(&property.id);
        if let Err(e) = self.invalidator.delete_key(&property_key).await {
            warn!(key = %property_key, error = %e, "Failed to delete property cache key");
        }

        let patterns = self
            .keys
            .property_invalidation_patterns(property, InvalidationScope::default());
        for pattern in &patterns {
            if let Err(e) = self.invalidator.invalidate_pattern(pattern).await {
                warn!(pattern = %pattern, error = %e, "Failed to invalidate cache pattern");
            }
        }

        info!(
            property_id = %property.id,
            images = doc.images.len(),
            patterns = patterns.len(),
            "Read model synchronized"
        );
        Ok(SyncOutcome { ok: true, doc })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheMetrics, MemoryBackend};
    use crate::error::CacheError;
    use crate::readmodel::store::{DocumentStore, MemoryDocumentStore};
    use std::sync::Mutex;

    /// Fails for URLs containing "broken", prefixes the rest with `https://cdn.test/`.
    struct FlakyResolver;

    #[async_trait]
    impl ImageResolver for FlakyResolver {
        async fn resolve(&self, raw_url: &str) -> Result<String> {
            if raw_url.contains("broken") {
                Err(CacheError::Internal("storage unavailable".to_string()))
            } else {
                Ok(format!("https://cdn.test/{}", raw_url))
            }
        }
    }

    /// Records every call; fails pattern invalidations listed in `failing`.
    #[derive(Default)]
    struct RecordingInvalidator {
        calls: Mutex<Vec<String>>,
        failing: Vec<String>,
    }

    #[async_trait]
    impl CacheInvalidator for RecordingInvalidator {
        async fn delete_key(&self, key: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("del {}", key));
            Ok(())
        }

        async fn invalidate_pattern(&self, pattern: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("pattern {}", pattern));
            if self.failing.iter().any(|p| p == pattern) {
                return Err(CacheError::Backend("scan failed".to_string()));
            }
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl DocumentSink for FailingSink {
        async fn upsert_property_document(&self, _id: &str, _doc: &PropertyDocument) -> Result<()> {
            Err(CacheError::Internal("document store offline".to_string()))
        }
    }

    fn row() -> PropertyRow {
        PropertyRow {
            id: "p1".to_string(),
            title: "Loft".to_string(),
            description: Some("Bright".to_string()),
            price: Some(100_000.0),
            square_meters: Some(50.0),
            seller_id: Some("s1".to_string()),
            city: Some("Rosario".to_string()),
            operation_status_id: Some(1),
            ..PropertyRow::default()
        }
    }

    fn images() -> Vec<PropertyImage> {
        vec![
            PropertyImage { url: "p1/a.jpg".to_string(), position: Some(0), alt: None },
            PropertyImage { url: "p1/broken.jpg".to_string(), position: Some(1), alt: None },
        ]
    }

    #[tokio::test]
    async fn test_resolver_failure_keeps_original_url_and_invalidates_everything() {
        let store = Arc::new(MemoryDocumentStore::new("listings"));
        let invalidator = Arc::new(RecordingInvalidator::default());
        let sync = ReadModelSynchronizer::new(
            Arc::new(FlakyResolver),
            store.clone(),
            invalidator.clone(),
            CacheKeys::new(),
            "USD",
        );

        let outcome = sync.build_and_upsert(&row(), &images(), &[]).await.unwrap();

        assert!(outcome.ok);
        assert_eq!(outcome.doc.images, vec!["https://cdn.test/p1/a.jpg", "p1/broken.jpg"]);
        let stored = store.get_property_document("p1").await.unwrap().unwrap();
        assert_eq!(stored.images, outcome.doc.images);

        let expected_patterns =
            CacheKeys::new().property_invalidation_patterns(&row(), InvalidationScope::default());
        let calls = invalidator.calls.lock().unwrap().clone();
        assert_eq!(calls[0], "del v1:property:p1");
        assert_eq!(calls.len(), 1 + expected_patterns.len());
        for (call, pattern) in calls[1..].iter().zip(&expected_patterns) {
            assert_eq!(call, &format!("pattern {}", pattern));
        }
    }

    #[tokio::test]
    async fn test_failed_pattern_does_not_stop_the_rest() {
        let patterns = CacheKeys::new().property_invalidation_patterns(&row(), InvalidationScope::default());
        let invalidator = Arc::new(RecordingInvalidator {
            calls: Mutex::new(Vec::new()),
            failing: vec![patterns[0].clone()],
        });
        let sync = ReadModelSynchronizer::new(
            Arc::new(FlakyResolver),
            Arc::new(MemoryDocumentStore::new("listings")),
            invalidator.clone(),
            CacheKeys::new(),
            "USD",
        );

        let outcome = sync.build_and_upsert(&row(), &[], &[]).await;

        assert!(outcome.is_ok());
        assert_eq!(invalidator.calls.lock().unwrap().len(), 1 + patterns.len());
    }

    #[tokio::test]
    async fn test_sink_failure_is_returned_and_cache_untouched() {
        let invalidator = Arc::new(RecordingInvalidator::default());
        let sync = ReadModelSynchronizer::new(
            Arc::new(FlakyResolver),
            Arc::new(FailingSink),
            invalidator.clone(),
            CacheKeys::new(),
            "USD",
        );

        let result = sync.build_and_upsert(&row(), &[], &[]).await;

        assert!(matches!(result, Err(CacheError::Internal(_))));
        assert!(invalidator.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sync_clears_real_cache_entries() {
        let keys = CacheKeys::new();
        let cache = Arc::new(CacheStore::new(
            Arc::new(MemoryBackend::new()),
            Arc::new(CacheMetrics::new()),
        ));
        cache.set(&keys.property("p1"), &"old", None).await;
        cache.set(&keys.properties().list(), &"page", None).await;
        cache.set(&keys.properties().filtered([("zone", "rosario")]), &"page", None).await;
        cache.set(&keys.seller("s1").list(), &"page", None).await;
        cache.set(&keys.seller("s2").list(), &"other seller", None).await;

        let sync = ReadModelSynchronizer::new(
            Arc::new(FlakyResolver),
            Arc::new(MemoryDocumentStore::new("listings")),
            cache.clone(),
            keys,
            "USD",
        );
        sync.build_and_upsert(&row(), &[], &[]).await.unwrap();

        let remaining = cache.backend().keys("*").await.unwrap();
        assert_eq!(remaining, vec![keys.seller("s2").list()]);
    }
}
