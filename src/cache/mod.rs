//! Cache Module
//!
//! Read-through cache with wildcard invalidation over Redis, falling back to
//! a process-local map when no Redis URL is configured.

mod backend;
mod entry;
mod keys;
mod memory;
mod metrics;
mod pattern;
mod remote;
mod semantic;
mod store;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export public types
pub use backend::{KvBackend, ScanPage, StoredValue};
pub use entry::CacheEntry;
pub use keys::{cache_version, CacheKeys, InvalidationScope, ListKeys, CACHE_VERSION};
pub use memory::MemoryBackend;
pub use metrics::{CacheMetrics, CacheMetricsSnapshot, CacheOpKind, ErrorCounts, AGE_SAMPLE_CAP};
pub use pattern::{escape_glob, glob_to_regex};
pub use remote::RedisBackend;
pub use semantic::{filter_hash, normalize_filters, semantic_list_key, FilterValue};
pub use store::{CacheStore, CachedValue, SCAN_PAGE_SIZE};
