//! In-memory backend
//!
//! Process-local stand-in for Redis used when no backend URL is configured.
//! State is not shared across processes, so multi-instance deployments
//! without Redis diverge; this mode exists for local development.
//!
//! Keys are kept ordered. A SCAN cursor names the last key the previous page
//! examined, so the next page resumes right after it no matter what was
//! written or deleted in between.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::cache::backend::{KvBackend, ScanPage, StoredValue};
use crate::cache::entry::{current_timestamp_ms, CacheEntry};
use crate::cache::pattern::glob_to_regex;
use crate::error::{CacheError, Result};

/// Open SCAN cursors kept before the oldest is dropped.
const MAX_OPEN_CURSORS: usize = 1024;

// == Memory Backend ==
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<String, CacheEntry>>,
    /// Cursor id -> last key examined by the page that issued it
    cursors: Mutex<BTreeMap<u64, String>>,
    next_cursor: AtomicU64,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    // == Purge Expired ==
    /// Removes all expired entries and returns how many were dropped.
    ///
    /// Reads already skip expired entries; this only bounds memory.
    pub async fn purge_expired(&self) -> usize {
        let now = current_timestamp_ms();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        before - entries.len()
    }

    /// Number of stored entries, expired ones included until purged.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Number of SCAN cursors handed out and not yet resumed.
    pub fn open_cursors(&self) -> usize {
        self.cursors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn open_cursor(&self, last_key: String) -> u64 {
        let id = self.next_cursor.fetch_add(1, Ordering::Relaxed) + 1;
        let mut cursors = self.cursors.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // Abandoned scans never come back for their cursor
        while cursors.len() >= MAX_OPEN_CURSORS {
            cursors.pop_first();
        }
        cursors.insert(id, last_key);
        id
    }

    fn resume_cursor(&self, cursor: u64) -> Result<String> {
        self.cursors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&cursor)
            .ok_or_else(|| CacheError::Backend(format!("unknown scan cursor {}", cursor)))
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        // Expired: drop it now rather than waiting for the sweep
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| entry.is_expired()) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn get_with_ttl(&self, key: &str) -> Result<Option<StoredValue>> {
        let now = current_timestamp_ms();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| StoredValue {
                value: entry.value.clone(),
                ttl_remaining_ms: entry.remaining_ms_at(now),
            }))
    }

    async fn set(&self, key: &str, value: String, ttl_seconds: Option<u64>) -> Result<()> {
        let entry = CacheEntry::new(value, ttl_seconds);
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64> {
        let now = current_timestamp_ms();
        let mut entries = self.entries.write().await;
        let removed = keys
            .iter()
            .filter_map(|key| entries.remove(key))
            .filter(|entry| !entry.is_expired_at(now))
            .count();
        Ok(removed as u64)
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage> {
        let matcher = glob_to_regex(pattern)?;
        let after = match cursor {
            0 => None,
            cursor => Some(self.resume_cursor(cursor)?),
        };

        let now = current_timestamp_ms();
        let entries = self.entries.read().await;
        let start = after.as_deref().map_or(Bound::Unbounded, Bound::Excluded);
        let mut range = entries.range::<str, _>((start, Bound::Unbounded)).peekable();

        // Like Redis, COUNT bounds the keys examined, not the keys returned
        let mut page = Vec::new();
        let mut last = None;
        for (key, entry) in range.by_ref().take(count.max(1)) {
            if !entry.is_expired_at(now) && matcher.is_match(key) {
                page.push(key.clone());
            }
            last = Some(key);
        }

        let next = match (range.peek(), last) {
            (Some(_), Some(last)) => self.open_cursor(last.clone()),
            _ => 0,
        };
        Ok(ScanPage { cursor: next, keys: page })
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let now = current_timestamp_ms();
        let mut entries = self.entries.write().await;

        match entries.get_mut(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                let current: i64 = entry.value.parse().map_err(|_| {
                    CacheError::Backend(format!("value at '{}' is not an integer", key))
                })?;
                let next = current + 1;
                entry.value = next.to_string();
                Ok(next)
            }
            _ => {
                entries.insert(key.to_string(), CacheEntry::new("1".to_string(), None));
                Ok(1)
            }
        }
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool> {
        let now = current_timestamp_ms();
        let mut entries = self.entries.write().await;

        match entries.get_mut(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                entry.expire_in(seconds);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let matcher = glob_to_regex(pattern)?;
        let now = current_timestamp_ms();
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|(key, entry)| !entry.is_expired_at(now) && matcher.is_match(key))
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
