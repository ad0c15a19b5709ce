//! Cache Entry Module
//!
//! Entries held by the in-memory backend. Expiry is an absolute timestamp
//! checked lazily on every read and enumeration.

use std::time::{SystemTime, UNIX_EPOCH};

// == Cache Entry ==
/// A raw string value plus the bookkeeping the in-memory backend needs.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored value, exactly as the backend received it
    pub value: String,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl CacheEntry {
    /// Creates a new entry, expiring `ttl_seconds` from now when given.
    pub fn new(value: String, ttl_seconds: Option<u64>) -> Self {
        let now = current_timestamp_ms();

        Self {
            value,
            created_at: now,
            expires_at: ttl_seconds.map(|ttl| now + ttl * 1000),
        }
    }

    /// True once the current time reaches the expiration time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Same as [`is_expired`](Self::is_expired) against a caller-provided clock.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        matches!(self.expires_at, Some(expires) if now_ms >= expires)
    }

    /// Moves the expiry to `ttl_seconds` from now, as `EXPIRE` does.
    pub fn expire_in(&mut self, ttl_seconds: u64) {
        self.expires_at = Some(current_timestamp_ms() + ttl_seconds * 1000);
    }

    /// Milliseconds left before expiry, as `PTTL` reports them.
    pub fn remaining_ms_at(&self, now_ms: u64) -> Option<u64> {
        self.expires_at.map(|expires| expires.saturating_sub(now_ms))
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
