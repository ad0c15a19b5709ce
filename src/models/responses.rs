//! Response DTOs for the listing cache API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Active key-value backend (`redis` or `memory`)
    pub cache_backend: String,
    /// Key-shape version in use
    pub cache_version: u32,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy(cache_backend: impl Into<String>, cache_version: u32) -> Self {
        Self {
            status: "healthy".to_string(),
            cache_backend: cache_backend.into(),
            cache_version,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Response body for `POST /admin/cache/invalidate`
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    /// Patterns that were invalidated, in order
    pub patterns: Vec<String>,
    /// Total number of keys removed
    pub removed: u64,
}

impl InvalidateResponse {
    pub fn new(patterns: Vec<String>, removed: u64) -> Self {
        Self { patterns, removed }
    }
}
