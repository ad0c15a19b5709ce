//! Composition root
//!
//! Builds the key-value backend and the document store a process uses and
//! hands them to the server and the maintenance CLI alike.

use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::{CacheMetrics, CacheStore, KvBackend, MemoryBackend, RedisBackend};
use crate::config::Config;
use crate::error::Result;
use crate::ratelimit::RateLimiter;
use crate::readmodel::{DocumentSink, DocumentStore, MemoryDocumentStore, PgDocumentStore};

/// Backends selected for this process.
#[derive(Clone)]
pub struct Backends {
    /// Backend behind the cache
    pub kv: Arc<dyn KvBackend>,
    /// Set when running on the in-memory fallback, for the expiry sweep
    pub memory: Option<Arc<MemoryBackend>>,
}

impl Backends {
    /// Connects to Redis when `REDIS_URL` is set, otherwise (or when the
    /// connection fails) uses the process-local fallback.
    pub async fn connect(config: &Config) -> Self {
        if let Some(url) = config.redis_url.as_deref() {
            match RedisBackend::connect(url).await {
                Ok(redis) => {
                    return Self {
                        kv: Arc::new(redis),
                        memory: None,
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Redis unavailable, falling back to in-memory cache");
                }
            }
        } else {
            info!("REDIS_URL not set, using in-memory cache");
        }
        Self::in_memory()
    }

    pub fn in_memory() -> Self {
        let memory = Arc::new(MemoryBackend::new());
        Self {
            kv: memory.clone(),
            memory: Some(memory),
        }
    }

    pub fn cache(&self, metrics: Arc<CacheMetrics>) -> CacheStore {
        CacheStore::new(self.kv.clone(), metrics)
    }

    /// Rate limiter sharing the remote backend; local windows otherwise.
    pub fn rate_limiter(&self) -> RateLimiter {
        match self.memory {
            Some(_) => RateLimiter::local(),
            None => RateLimiter::new(Some(self.kv.clone())),
        }
    }
}

// == Documents ==
/// The read-model store, seen both as a reader and as the sync target.
#[derive(Clone)]
pub struct Documents {
    pub store: Arc<dyn DocumentStore>,
    pub sink: Arc<dyn DocumentSink>,
}

impl Documents {
    pub fn from_store<D: DocumentStore + 'static>(store: Arc<D>) -> Self {
        Self {
            store: store.clone(),
            sink: store,
        }
    }

    /// Postgres when `DOCUMENT_STORE_URL` is set, process memory otherwise.
    ///
    /// Unlike the cache, a configured store that cannot be reached is an
    /// error: documents written elsewhere would be lost.
    pub async fn connect(config: &Config) -> Result<Self> {
        match config.document_store_url.as_deref() {
            Some(url) => {
                let store = PgDocumentStore::connect(
                    url,
                    &config.document_store_db,
                    config.document_store_max_connections,
                )
                .await?;
                Ok(Self::from_store(Arc::new(store)))
            }
            None => {
                warn!(
                    database = %config.document_store_db,
                    "DOCUMENT_STORE_URL not set, read model kept in process memory"
                );
                Ok(Self::in_memory(&config.document_store_db))
            }
        }
    }

    pub fn in_memory(database: &str) -> Self {
        Self::from_store(Arc::new(MemoryDocumentStore::new(database)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_without_url_uses_memory() {
        let backends = Backends::connect(&Config::default()).await;

        assert_eq!(backends.kv.backend_name(), "memory");
        assert!(backends.memory.is_some());
    }

    #[tokio::test]
    async fn test_unreachable_redis_falls_back() {
        let config = Config {
            redis_url: Some("redis://127.0.0.1:1/".to_string()),
            ..Config::default()
        };

        let backends = Backends::connect(&config).await;
        assert_eq!(backends.kv.backend_name(), "memory");
    }

    #[tokio::test]
    async fn test_cache_uses_selected_backend() {
        let backends = Backends::in_memory();
        let cache = backends.cache(Arc::new(CacheMetrics::new()));

        cache.set("k", &1, None).await;
        assert_eq!(backends.kv.get("k").await.unwrap(), Some("1".to_string()));
    }

    #[tokio::test]
    async fn test_documents_without_url_use_memory() {
        let documents = Documents::connect(&Config::default()).await.unwrap();
        let doc = crate::readmodel::PropertyDocument::build(
            &crate::property::PropertyRow {
                id: "p1".to_string(),
                ..Default::default()
            },
            Vec::new(),
            &[],
            "USD",
        );

        documents.sink.upsert_property_document("p1", &doc).await.unwrap();
        assert_eq!(documents.store.get_property_document("p1").await.unwrap(), Some(doc));
    }
}
