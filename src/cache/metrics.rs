//! Cache Metrics Module
//!
//! Process-local, advisory counters for every cache operation plus a rolling
//! sample of observed entry ages.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;

/// Maximum number of age observations kept for the average.
pub const AGE_SAMPLE_CAP: usize = 1000;

/// Operation that produced a backend error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOpKind {
    Get,
    Set,
    Delete,
    Pattern,
}

// == Cache Metrics ==
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    stale: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    pattern_invalidations: AtomicU64,
    get_errors: AtomicU64,
    set_errors: AtomicU64,
    delete_errors: AtomicU64,
    pattern_errors: AtomicU64,
    ages: Mutex<VecDeque<f64>>,
}

/// Error counters broken down by operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorCounts {
    pub get: u64,
    pub set: u64,
    pub delete: u64,
    pub pattern: u64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub stale: u64,
    pub sets: u64,
    pub deletes: u64,
    pub pattern_invalidations: u64,
    pub errors: ErrorCounts,
    /// Percentage of lookups served from cache, 0 when there were none
    pub hit_rate: f64,
    /// Mean age in seconds over the age sample
    pub average_age_seconds: f64,
    pub age_sample_size: usize,
}

impl CacheMetrics {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a hit; the age joins the sample only when known.
    pub fn record_hit(&self, age_seconds: Option<f64>) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        if let Some(age) = age_seconds {
            self.push_age(age);
        }
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale(&self, age_seconds: Option<f64>) {
        self.stale.fetch_add(1, Ordering::Relaxed);
        if let Some(age) = age_seconds {
            self.push_age(age);
        }
    }

    pub fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pattern_invalidation(&self) {
        self.pattern_invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, kind: CacheOpKind) {
        let counter = match kind {
            CacheOpKind::Get => &self.get_errors,
            CacheOpKind::Set => &self.set_errors,
            CacheOpKind::Delete => &self.delete_errors,
            CacheOpKind::Pattern => &self.pattern_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    // == Snapshot ==
    /// Reads the counters without modifying them.
    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let stale = self.stale.load(Ordering::Relaxed);

        let lookups = hits + misses + stale;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            (hits as f64 * 100.0) / lookups as f64
        };

        let (average_age_seconds, age_sample_size) = {
            let ages = self.ages.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if ages.is_empty() {
                (0.0, 0)
            } else {
                (ages.iter().sum::<f64>() / ages.len() as f64, ages.len())
            }
        };

        CacheMetricsSnapshot {
            hits,
            misses,
            stale,
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            pattern_invalidations: self.pattern_invalidations.load(Ordering::Relaxed),
            errors: ErrorCounts {
                get: self.get_errors.load(Ordering::Relaxed),
                set: self.set_errors.load(Ordering::Relaxed),
                delete: self.delete_errors.load(Ordering::Relaxed),
                pattern: self.pattern_errors.load(Ordering::Relaxed),
            },
            hit_rate,
            average_age_seconds,
            age_sample_size,
        }
    }

    /// Zeroes everything. Test isolation only.
    pub fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.stale,
            &self.sets,
            &self.deletes,
            &self.pattern_invalidations,
            &self.get_errors,
            &self.set_errors,
            &self.delete_errors,
            &self.pattern_errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.ages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    fn push_age(&self, age_seconds: f64) {
        let mut ages = self.ages.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        ages.push_back(age_seconds.max(0.0));
        while ages.len() > AGE_SAMPLE_CAP {
            ages.pop_front();
        }
    }
}
