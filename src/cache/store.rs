//! Cache Store Module
//!
//! Best-effort cache primitive over a [`KvBackend`]. Every backend failure is
//! logged, counted and degraded to a miss or a no-op: callers always have the
//! source of truth to fall back on, so nothing here returns an error.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::cache::backend::{KvBackend, StoredValue};
use crate::cache::metrics::{CacheMetrics, CacheOpKind};
use crate::error::Result;

/// Page size used when enumerating keys for pattern invalidation.
pub const SCAN_PAGE_SIZE: usize = 100;

/// A cached payload, decoded when possible.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue<T> {
    /// Stored JSON decoded into the requested type
    Parsed(T),
    /// Stored text that did not decode; returned as-is
    Raw(String),
}

// == Cache Store ==
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn KvBackend>,
    metrics: Arc<CacheMetrics>,
}

impl CacheStore {
    // == Constructor ==
    pub fn new(backend: Arc<dyn KvBackend>, metrics: Arc<CacheMetrics>) -> Self {
        Self { backend, metrics }
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }

    pub fn backend(&self) -> &Arc<dyn KvBackend> {
        &self.backend
    }

    // == Get ==
    /// Reads `key`, decoding JSON into `T` or falling back to the raw text.
    ///
    /// Text that happens to be valid JSON for `T` decodes: a stored `"42"`
    /// read as a number is `Parsed(42)`, read as a `String` it is `Raw`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<CachedValue<T>> {
        self.lookup(key, None).await
    }

    /// [`get`](Self::get) with the caller's estimate of the entry age, which
    /// feeds the age sample on a hit.
    pub async fn get_with_age<T: DeserializeOwned>(
        &self,
        key: &str,
        age_seconds: f64,
    ) -> Option<CachedValue<T>> {
        self.lookup(key, Some(age_seconds)).await
    }

    async fn lookup<T: DeserializeOwned>(
        &self,
        key: &str,
        age_seconds: Option<f64>,
    ) -> Option<CachedValue<T>> {
        let Some(stored) = self.fetch(key).await else {
            self.metrics.record_miss();
            debug!(key = key, "Cache MISS");
            return None;
        };
        let raw = stored.value;

        self.metrics.record_hit(age_seconds);
        debug!(key = key, "Cache HIT");

        Some(match serde_json::from_str(&raw) {
            Ok(value) => CachedValue::Parsed(value),
            Err(_) => CachedValue::Raw(raw),
        })
    }

    /// Reads `key` as text without attempting to decode it.
    pub async fn get_string(&self, key: &str) -> Option<String> {
        match self.fetch(key).await {
            Some(stored) => {
                self.metrics.record_hit(None);
                Some(stored.value)
            }
            None => {
                self.metrics.record_miss();
                None
            }
        }
    }

    // == Set ==
    /// Stores `value`; strings verbatim, everything else as JSON.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_seconds: Option<u64>) {
        let payload = match encode(value) {
            Ok(payload) => payload,
            Err(e) => {
                self.metrics.record_error(CacheOpKind::Set);
                warn!(key = key, error = %e, "Failed to serialize value for cache");
                return;
            }
        };

        match self.backend.set(key, payload, ttl_seconds).await {
            Ok(()) => self.metrics.record_set(),
            Err(e) => {
                self.metrics.record_error(CacheOpKind::Set);
                warn!(key = key, error = %e, "Cache write failed");
            }
        }
    }

    // == Delete ==
    /// Removes `key`; absent keys are not an error.
    pub async fn delete(&self, key: &str) {
        match self.backend.del(&[key.to_string()]).await {
            Ok(_) => self.metrics.record_delete(),
            Err(e) => {
                self.metrics.record_error(CacheOpKind::Delete);
                warn!(key = key, error = %e, "Cache delete failed");
            }
        }
    }

    // == Invalidate Pattern ==
    /// Deletes every key matching the `*` glob and returns how many went.
    ///
    /// Enumerates with SCAN until the cursor returns to 0, then issues a
    /// single DEL. Not atomic against concurrent writes to matching keys.
    pub async fn invalidate_pattern(&self, pattern: &str) -> u64 {
        match self.scan_and_delete(pattern).await {
            Ok(removed) => {
                self.metrics.record_pattern_invalidation();
                debug!(pattern = pattern, removed = removed, "Invalidated cache pattern");
                removed
            }
            Err(e) => {
                self.metrics.record_error(CacheOpKind::Pattern);
                warn!(pattern = pattern, error = %e, "Cache pattern invalidation failed");
                0
            }
        }
    }

    // == Read Through ==
    /// Returns the cached `T` for `key`, or runs `loader` and caches its result.
    ///
    /// A cached payload that no longer decodes as `T` is counted as stale and
    /// replaced. Loader errors are returned untouched and nothing is cached.
    ///
    /// The age sampled on a hit is `ttl_seconds` minus the time the entry has
    /// left, which assumes it was written with the same TTL.
    pub async fn read_through<T, F, Fut>(&self, key: &str, ttl_seconds: Option<u64>, loader: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match self.fetch(key).await {
            Some(stored) => match serde_json::from_str::<T>(&stored.value) {
                Ok(value) => {
                    self.metrics.record_hit(entry_age(ttl_seconds, stored.ttl_remaining_ms));
                    return Ok(value);
                }
                Err(e) => {
                    self.metrics.record_stale(entry_age(ttl_seconds, stored.ttl_remaining_ms));
                    debug!(key = key, error = %e, "Cached payload has an outdated shape");
                }
            },
            None => self.metrics.record_miss(),
        }

        let value = loader().await?;
        self.set(key, &value, ttl_seconds).await;
        Ok(value)
    }

    /// Raw backend read; errors count as `get` errors and read as a miss.
    async fn fetch(&self, key: &str) -> Option<StoredValue> {
        match self.backend.get_with_ttl(key).await {
            Ok(value) => value,
            Err(e) => {
                self.metrics.record_error(CacheOpKind::Get);
                warn!(key = key, error = %e, "Cache read failed");
                None
            }
        }
    }

    async fn scan_and_delete(&self, pattern: &str) -> Result<u64> {
        // SCAN may return a key more than once
        let mut matched = BTreeSet::new();
        let mut cursor = 0;
        loop {
            let page = self.backend.scan(cursor, pattern, SCAN_PAGE_SIZE).await?;
            matched.extend(page.keys);
            cursor = page.cursor;
            if cursor == 0 {
                break;
            }
        }

        if matched.is_empty() {
            return Ok(0);
        }
        let keys: Vec<String> = matched.into_iter().collect();
        self.backend.del(&keys).await
    }
}

/// Seconds since an entry written with `ttl_seconds` was stored, when both
/// the TTL and the time left are known.
fn entry_age(ttl_seconds: Option<u64>, remaining_ms: Option<u64>) -> Option<f64> {
    let ttl_ms = ttl_seconds?.saturating_mul(1000);
    Some(ttl_ms.saturating_sub(remaining_ms?) as f64 / 1000.0)
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(match serde_json::to_value(value)? {
        serde_json::Value::String(text) => text,
        other => other.to_string(),
    })
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_support::DownBackend;
    use crate::cache::MemoryBackend;
    use crate::error::CacheError;
    use serde::Deserialize;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Listing {
        id: u32,
        title: String,
    }

    fn memory_store() -> CacheStore {
        CacheStore::new(Arc::new(MemoryBackend::new()), Arc::new(CacheMetrics::new()))
    }

    #[tokio::test]
    async fn test_set_and_get_struct() {
        let store = memory_store();
        let listing = Listing { id: 1, title: "Loft".to_string() };

        store.set("v1:property:1", &listing, None).await;
        let cached = store.get::<Listing>("v1:property:1").await;

        assert_eq!(cached, Some(CachedValue::Parsed(listing)));
    }

    #[tokio::test]
    async fn test_get_missing_records_miss() {
        let store = memory_store();

        assert!(store.get::<Listing>("missing").await.is_none());
        assert_eq!(store.metrics().snapshot().misses, 1);
    }

    #[tokio::test]
    async fn test_malformed_json_returns_raw() {
        let store = memory_store();
        store.set("k", "not json {", None).await;

        let cached = store.get::<Listing>("k").await;
        assert_eq!(cached, Some(CachedValue::Raw("not json {".to_string())));
    }

    #[tokio::test]
    async fn test_text_that_is_json_decodes_by_requested_type() {
        let store = memory_store();
        store.set("number", "42", None).await;
        store.set("quoted", "\"x\"", None).await;

        assert_eq!(store.get::<String>("number").await, Some(CachedValue::Raw("42".to_string())));
        assert_eq!(store.get::<i32>("number").await, Some(CachedValue::Parsed(42)));
        assert_eq!(store.get::<String>("quoted").await, Some(CachedValue::Parsed("x".to_string())));
    }

    #[tokio::test]
    async fn test_strings_stored_verbatim() {
        let store = memory_store();
        store.set("k", "hello", None).await;

        assert_eq!(store.backend().get("k").await.unwrap(), Some("hello".to_string()));
        assert_eq!(store.get_string("k").await, Some("hello".to_string()));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = memory_store();
        store.set("k", &1, None).await;

        store.delete("k").await;
        store.delete("k").await;

        assert!(store.get::<i32>("k").await.is_none());
        assert_eq!(store.metrics().snapshot().errors.delete, 0);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let store = memory_store();
        store.set("k", &42, Some(1)).await;
        assert_eq!(store.get::<i32>("k").await, Some(CachedValue::Parsed(42)));

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(store.get::<i32>("k").await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_pattern_example() {
        let store = memory_store();
        store.set("v1:prop:1", &1, None).await;
        store.set("v1:prop:2", &2, None).await;
        store.set("v1:other:3", &3, None).await;

        let removed = store.invalidate_pattern("v1:prop:*").await;

        assert_eq!(removed, 2);
        assert!(store.get::<i32>("v1:prop:1").await.is_none());
        assert!(store.get::<i32>("v1:prop:2").await.is_none());
        assert_eq!(store.get::<i32>("v1:other:3").await, Some(CachedValue::Parsed(3)));
        assert_eq!(store.metrics().snapshot().pattern_invalidations, 1);
    }

    #[tokio::test]
    async fn test_invalidate_pattern_spans_scan_pages() {
        let store = memory_store();
        for i in 0..250 {
            store.set(&format!("v1:properties:list:{i}"), &i, None).await;
        }

        assert_eq!(store.invalidate_pattern("v1:properties:*").await, 250);
        assert_eq!(store.backend().keys("*").await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_backend_errors_are_swallowed_and_counted() {
        let store = CacheStore::new(Arc::new(DownBackend), Arc::new(CacheMetrics::new()));

        assert!(store.get::<i32>("k").await.is_none());
        store.set("k", &1, None).await;
        store.delete("k").await;
        assert_eq!(store.invalidate_pattern("k*").await, 0);

        let snapshot = store.metrics().snapshot();
        assert_eq!(snapshot.errors.get, 1);
        assert_eq!(snapshot.errors.set, 1);
        assert_eq!(snapshot.errors.delete, 1);
        assert_eq!(snapshot.errors.pattern, 1);
        assert_eq!(snapshot.sets, 0);
    }

    #[tokio::test]
    async fn test_read_through_populates_then_hits() {
        let store = memory_store();

        let first = store
            .read_through("v1:property:9", Some(60), || async {
                Ok(Listing { id: 9, title: "House".to_string() })
            })
            .await
            .unwrap();
        let second: Listing = store
            .read_through("v1:property:9", Some(60), || async {
                Err(CacheError::Internal("loader must not run on a hit".to_string()))
            })
            .await
            .unwrap();

        assert_eq!(first, second);
        let snapshot = store.metrics().snapshot();
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.hits, 1);
        assert_eq!(snapshot.sets, 1);
    }

    #[tokio::test]
    async fn test_read_through_hit_samples_entry_age() {
        let store = memory_store();
        store.set("v1:property:9", &Listing { id: 9, title: "House".to_string() }, Some(60)).await;

        // Read with a longer TTL than the write: the entry looks 30 s old
        let _: Listing = store
            .read_through("v1:property:9", Some(90), || async {
                Err(CacheError::Internal("loader must not run on a hit".to_string()))
            })
            .await
            .unwrap();

        let snapshot = store.metrics().snapshot();
        assert_eq!(snapshot.age_sample_size, 1);
        assert!(snapshot.average_age_seconds >= 30.0 && snapshot.average_age_seconds < 31.0);
    }

    #[tokio::test]
    async fn test_hits_without_known_age_are_not_sampled() {
        let store = memory_store();
        store.set("k", &1, None).await;

        store.get::<i32>("k").await;
        store.get_string("k").await;
        store.read_through("k", Some(60), || async { Ok(1_i32) }).await.unwrap();
        store.get_with_age::<i32>("k", 4.0).await;

        let snapshot = store.metrics().snapshot();
        assert_eq!(snapshot.hits, 4);
        assert_eq!(snapshot.age_sample_size, 1);
        assert_eq!(snapshot.average_age_seconds, 4.0);
    }

    #[test]
    fn test_entry_age() {
        assert_eq!(entry_age(Some(300), Some(240_000)), Some(60.0));
        assert_eq!(entry_age(Some(60), Some(90_000)), Some(0.0));
        assert_eq!(entry_age(None, Some(1_000)), None);
        assert_eq!(entry_age(Some(60), None), None);
    }

    #[tokio::test]
    async fn test_read_through_replaces_stale_shape() {
        let store = memory_store();
        store.set("v1:property:9", &serde_json::json!({"legacy": true}), None).await;

        let listing = store
            .read_through("v1:property:9", None, || async {
                Ok(Listing { id: 9, title: "House".to_string() })
            })
            .await
            .unwrap();

        assert_eq!(listing.id, 9);
        assert_eq!(store.metrics().snapshot().stale, 1);
        assert_eq!(
            store.get::<Listing>("v1:property:9").await,
            Some(CachedValue::Parsed(listing))
        );
    }

    #[tokio::test]
    async fn test_read_through_falls_back_when_backend_down() {
        let store = CacheStore::new(Arc::new(DownBackend), Arc::new(CacheMetrics::new()));

        let value = store
            .read_through("k", None, || async { Ok(7_i32) })
            .await
            .unwrap();

        assert_eq!(value, 7);
    }
}
