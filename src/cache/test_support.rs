//! Backend doubles shared by the unit tests of the cache and the limiter.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::cache::backend::{KvBackend, ScanPage};
use crate::cache::MemoryBackend;
use crate::error::{CacheError, Result};

fn refused<T>() -> Result<T> {
    Err(CacheError::Backend("connection refused".to_string()))
}

/// Backend whose every command fails, as an unreachable Redis would.
pub(crate) struct DownBackend;

#[async_trait]
impl KvBackend for DownBackend {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        refused()
    }
    async fn set(&self, _key: &str, _value: String, _ttl: Option<u64>) -> Result<()> {
        refused()
    }
    async fn del(&self, _keys: &[String]) -> Result<u64> {
        refused()
    }
    async fn scan(&self, _cursor: u64, _pattern: &str, _count: usize) -> Result<ScanPage> {
        refused()
    }
    async fn incr(&self, _key: &str) -> Result<i64> {
        refused()
    }
    async fn expire(&self, _key: &str, _seconds: u64) -> Result<bool> {
        refused()
    }
    async fn keys(&self, _pattern: &str) -> Result<Vec<String>> {
        refused()
    }
    fn backend_name(&self) -> &'static str {
        "down"
    }
}

/// In-memory backend whose `EXPIRE` always times out.
#[derive(Default)]
pub(crate) struct NoExpireBackend {
    inner: MemoryBackend,
    expire_calls: AtomicUsize,
}

impl NoExpireBackend {
    pub(crate) fn expire_calls(&self) -> usize {
        self.expire_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KvBackend for NoExpireBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }
    async fn set(&self, key: &str, value: String, ttl: Option<u64>) -> Result<()> {
        self.inner.set(key, value, ttl).await
    }
    async fn del(&self, keys: &[String]) -> Result<u64> {
        self.inner.del(keys).await
    }
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage> {
        self.inner.scan(cursor, pattern, count).await
    }
    async fn incr(&self, key: &str) -> Result<i64> {
        self.inner.incr(key).await
    }
    async fn expire(&self, _key: &str, _seconds: u64) -> Result<bool> {
        self.expire_calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Backend("timeout".to_string()))
    }
    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.inner.keys(pattern).await
    }
    fn backend_name(&self) -> &'static str {
        "no-expire"
    }
}
