//! API Handlers
//!
//! HTTP request handlers for the listing cache endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use tracing::{info, warn};

use crate::bootstrap::Documents;
use crate::cache::{CacheKeys, CacheMetricsSnapshot, CacheStore, InvalidationScope};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{HealthResponse, InvalidateRequest, InvalidateResponse, SearchQuery, SyncRequest};
use crate::ratelimit::RateLimiter;
use crate::readmodel::{
    DocumentStore, ImageResolver, PropertyDocument, ReadModelSynchronizer, SearchPage, SyncOutcome,
};

/// Header carrying the shared secret for `/sync/*` and `/admin/*`.
pub const SYNC_SECRET_HEADER: &str = "x-sync-secret";

/// Endpoint policy taken from [`Config`].
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub sync_secret: Option<String>,
    pub sync_rate_limit_max: u64,
    pub sync_rate_limit_window: u64,
    pub metrics_enabled: bool,
    pub default_ttl: u64,
}

impl From<&Config> for ApiSettings {
    fn from(config: &Config) -> Self {
        Self {
            sync_secret: config.sync_secret.clone(),
            sync_rate_limit_max: config.sync_rate_limit_max,
            sync_rate_limit_window: config.sync_rate_limit_window,
            metrics_enabled: config.metrics_endpoint_enabled(),
            default_ttl: config.default_ttl,
        }
    }
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheStore>,
    pub keys: CacheKeys,
    pub documents: Arc<dyn DocumentStore>,
    pub synchronizer: ReadModelSynchronizer,
    pub rate_limiter: Arc<RateLimiter>,
    pub settings: Arc<ApiSettings>,
}

impl AppState {
    /// Wires the synchronizer to `documents` and `cache`.
    pub fn new<D: DocumentStore + 'static>(
        cache: Arc<CacheStore>,
        documents: Arc<D>,
        resolver: Arc<dyn ImageResolver>,
        rate_limiter: Arc<RateLimiter>,
        config: &Config,
    ) -> Self {
        Self::with_documents(cache, Documents::from_store(documents), resolver, rate_limiter, config)
    }

    /// Same as [`new`](Self::new) for a store chosen at runtime.
    pub fn with_documents(
        cache: Arc<CacheStore>,
        documents: Documents,
        resolver: Arc<dyn ImageResolver>,
        rate_limiter: Arc<RateLimiter>,
        config: &Config,
    ) -> Self {
        let keys = CacheKeys::new();
        let synchronizer = ReadModelSynchronizer::new(
            resolver,
            documents.sink,
            cache.clone(),
            keys,
            config.default_currency.clone(),
        );

        Self {
            cache,
            keys,
            documents: documents.store,
            synchronizer,
            rate_limiter,
            settings: Arc::new(ApiSettings::from(config)),
        }
    }

    fn ttl(&self) -> Option<u64> {
        Some(self.settings.default_ttl)
    }
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(
        state.cache.backend().backend_name(),
        state.keys.version(),
    ))
}

/// Handler for GET /debug/cache-metrics
///
/// Answers 404 unless enabled by configuration.
pub async fn metrics_handler(State(state): State<AppState>) -> Result<Json<CacheMetricsSnapshot>> {
    if !state.settings.metrics_enabled {
        return Err(CacheError::NotFound("cache metrics endpoint is disabled".to_string()));
    }
    Ok(Json(state.cache.metrics().snapshot()))
}

/// Handler for POST /sync/property
///
/// Shared-secret check, then per-client rate limit, then the sync itself.
pub async fn sync_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SyncRequest>,
) -> Result<Json<SyncOutcome>> {
    authorize(&state, &headers)?;

    let client = client_id(&headers);
    let allowed = state
        .rate_limiter
        .check(
            &format!("sync:{}", client),
            state.settings.sync_rate_limit_max,
            state.settings.sync_rate_limit_window,
        )
        .await;
    if !allowed {
        warn!(client = %client, "Sync rate limit exceeded");
        return Err(CacheError::RateLimited(format!(
            "at most {} sync requests per {} seconds",
            state.settings.sync_rate_limit_max, state.settings.sync_rate_limit_window
        )));
    }

    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let outcome = state
        .synchronizer
        .build_and_upsert(&req.property, &req.images, &req.features)
        .await?;
    Ok(Json(outcome))
}

/// Handler for POST /admin/cache/invalidate
pub async fn invalidate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>> {
    authorize(&state, &headers)?;
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let patterns = match (req.pattern, req.property) {
        (Some(pattern), _) => vec![pattern.trim().to_string()],
        (None, Some(property)) if req.coarse => state.keys.affected_cache_patterns(&property),
        (None, Some(property)) => {
            let mut patterns = vec![state.keys.property(&property.id)];
            patterns.extend(
                state
                    .keys
                    .property_invalidation_patterns(&property, InvalidationScope::default()),
            );
            patterns
        }
        (None, None) => Vec::new(),
    };

    let mut removed = 0;
    for pattern in &patterns {
        removed += state.cache.invalidate_pattern(pattern).await;
    }
    info!(patterns = patterns.len(), removed = removed, "Admin cache invalidation");

    Ok(Json(InvalidateResponse::new(patterns, removed)))
}

/// Handler for GET /properties/:id
///
/// Read-through on the single-property key over the document store.
pub async fn get_property_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PropertyDocument>> {
    let key = state.keys.property(&id);
    let documents = state.documents.clone();

    let doc = state
        .cache
        .read_through(&key, state.ttl(), || async move {
            documents
                .get_property_document(&id)
                .await?
                .ok_or_else(|| CacheError::NotFound(format!("property '{}'", id)))
        })
        .await?;
    Ok(Json(doc))
}

/// Handler for GET /properties
///
/// Read-through on the semantic list key over document search.
pub async fn search_handler(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchPage>> {
    let filters = query.filters().map_err(CacheError::InvalidRequest)?;
    let pairs = query.cache_filters();
    let key = state
        .keys
        .properties()
        .filtered(pairs.iter().map(|(name, value)| (*name, value.as_str())));

    let documents = state.documents.clone();
    let (page, page_size) = (query.page(), query.page_size());
    let results = state
        .cache
        .read_through(&key, state.ttl(), || async move {
            documents.search_property_documents(&filters, page, page_size).await
        })
        .await?;
    Ok(Json(results))
}

// == Helpers ==
fn authorize(state: &AppState, headers: &HeaderMap) -> Result<()> {
    let Some(expected) = state.settings.sync_secret.as_deref() else {
        return Err(CacheError::Unauthorized("sync secret is not configured".to_string()));
    };
    let provided = headers
        .get(SYNC_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if constant_time_eq(provided.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err(CacheError::Unauthorized("invalid sync secret".to_string()))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// First `x-forwarded-for` hop, or `anonymous`.
fn client_id(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("anonymous")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheMetrics, MemoryBackend};
    use crate::property::PropertyRow;
    use crate::readmodel::{DocumentSink, MemoryDocumentStore, PublicUrlResolver};
    use axum::http::HeaderValue;

    fn test_state(config: &Config) -> (AppState, Arc<MemoryDocumentStore>) {
        let cache = Arc::new(CacheStore::new(
            Arc::new(MemoryBackend::new()),
            Arc::new(CacheMetrics::new()),
        ));
        let documents = Arc::new(MemoryDocumentStore::new("listings"));
        let resolver = Arc::new(PublicUrlResolver::new(Some("https://cdn.test")).unwrap());
        let state = AppState::new(
            cache,
            documents.clone(),
            resolver,
            Arc::new(RateLimiter::local()),
            config,
        );
        (state, documents)
    }

    fn secret_config() -> Config {
        Config {
            sync_secret: Some("s3cret".to_string()),
            sync_rate_limit_max: 2,
            ..Config::default()
        }
    }

    fn secret_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(SYNC_SECRET_HEADER, HeaderValue::from_static("s3cret"));
        headers
    }

    fn sync_request(id: &str) -> SyncRequest {
        SyncRequest {
            property: PropertyRow {
                id: id.to_string(),
                title: "Loft".to_string(),
                ..PropertyRow::default()
            },
            images: Vec::new(),
            features: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_health_handler() {
        let (state, _) = test_state(&Config::default());
        let response = health_handler(State(state)).await;
        assert_eq!(response.status, "healthy");
        assert_eq!(response.cache_backend, "memory");
    }

    #[tokio::test]
    async fn test_metrics_handler_disabled_in_production() {
        let config = Config {
            app_env: "production".to_string(),
            ..Config::default()
        };
        let (state, _) = test_state(&config);

        let result = metrics_handler(State(state)).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_sync_requires_secret() {
        let (state, _) = test_state(&secret_config());

        let result = sync_handler(State(state), HeaderMap::new(), Json(sync_request("p1"))).await;
        assert!(matches!(result, Err(CacheError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_sync_rejected_when_secret_not_configured() {
        let (state, _) = test_state(&Config::default());

        let result = sync_handler(State(state), secret_headers(), Json(sync_request("p1"))).await;
        assert!(matches!(result, Err(CacheError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_sync_rate_limited() {
        let (state, documents) = test_state(&secret_config());

        for id in ["p1", "p2"] {
            let result = sync_handler(State(state.clone()), secret_headers(), Json(sync_request(id))).await;
            assert!(result.is_ok());
        }
        let third = sync_handler(State(state), secret_headers(), Json(sync_request("p3"))).await;

        assert!(matches!(third, Err(CacheError::RateLimited(_))));
        assert_eq!(documents.len().await, 2);
    }

    #[tokio::test]
    async fn test_get_property_read_through() {
        let (state, documents) = test_state(&Config::default());
        let outcome = state
            .synchronizer
            .build_and_upsert(&sync_request("p1").property, &[], &[])
            .await
            .unwrap();

        let first = get_property_handler(State(state.clone()), Path("p1".to_string())).await.unwrap();
        assert_eq!(first.0, outcome.doc);

        // Served from cache even after the document changes underneath
        let mut changed = outcome.doc.clone();
        changed.title = "Changed".to_string();
        documents.upsert_property_document("p1", &changed).await.unwrap();
        let second = get_property_handler(State(state.clone()), Path("p1".to_string())).await.unwrap();
        assert_eq!(second.0.title, "Loft");

        let snapshot = state.cache.metrics().snapshot();
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.hits, 1);
    }

    #[tokio::test]
    async fn test_get_missing_property() {
        let (state, _) = test_state(&Config::default());

        let result = get_property_handler(State(state), Path("nope".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[test]
    fn test_client_id() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_id(&headers), "anonymous");

        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1, 10.0.0.2"));
        assert_eq!(client_id(&headers), "10.0.0.1");
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
