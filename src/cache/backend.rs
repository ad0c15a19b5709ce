//! Key-value backend contract
//!
//! The small Redis command subset the cache core relies on. Implemented by
//! [`RedisBackend`](super::RedisBackend) and by the process-local
//! [`MemoryBackend`](super::MemoryBackend) used when no Redis URL is configured.

use async_trait::async_trait;

use crate::error::Result;

/// One page of a cursor-based key enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor for the next call; `0` means the enumeration is complete
    pub cursor: u64,
    /// Keys found in this page (may be empty even when `cursor != 0`)
    pub keys: Vec<String>,
}

/// A value together with the time it has left to live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    pub value: String,
    /// Milliseconds until expiry, None when the key has no TTL or the
    /// backend cannot tell
    pub ttl_remaining_ms: Option<u64>,
}

#[async_trait]
pub trait KvBackend: Send + Sync {
    /// `GET key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// `GET key` + `PTTL key`. Backends that cannot report the TTL return
    /// the value alone.
    async fn get_with_ttl(&self, key: &str) -> Result<Option<StoredValue>> {
        Ok(self.get(key).await?.map(|value| StoredValue {
            value,
            ttl_remaining_ms: None,
        }))
    }

    /// `SET key value [EX ttl]`
    async fn set(&self, key: &str, value: String, ttl_seconds: Option<u64>) -> Result<()>;

    /// `DEL key [key ...]`, returning how many keys existed.
    async fn del(&self, keys: &[String]) -> Result<u64>;

    /// `SCAN cursor MATCH pattern COUNT count`
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage>;

    /// `INCR key`
    async fn incr(&self, key: &str) -> Result<i64>;

    /// `EXPIRE key seconds`, false when the key does not exist.
    async fn expire(&self, key: &str, seconds: u64) -> Result<bool>;

    /// `KEYS pattern`. Blocking on a large Redis; maintenance tooling only.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}
