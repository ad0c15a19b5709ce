//! Fixed-window rate limiter
//!
//! Counts requests per key with `INCR` + `EXPIRE` on the shared backend and
//! falls back to a process-local window map when the backend is absent or
//! failing. Bursts across a window boundary are allowed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::cache::KvBackend;

/// Prefix for counter keys on the backend.
pub const RATE_LIMIT_PREFIX: &str = "ratelimit:";

/// Local window count above which expired windows are dropped.
pub const LOCAL_PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u64,
    expires_at: Instant,
}

// == Rate Limiter ==
pub struct RateLimiter {
    backend: Option<Arc<dyn KvBackend>>,
    local: Mutex<HashMap<String, Window>>,
    prune_threshold: usize,
}

impl RateLimiter {
    /// Limiter counting on `backend`; `None` keeps every window in-process.
    pub fn new(backend: Option<Arc<dyn KvBackend>>) -> Self {
        Self {
            backend,
            local: Mutex::new(HashMap::new()),
            prune_threshold: LOCAL_PRUNE_THRESHOLD,
        }
    }

    /// Limiter with process-local windows only.
    pub fn local() -> Self {
        Self::new(None)
    }

    // == Check ==
    /// Counts one request for `key` and reports whether it is within
    /// `max_requests` for the current `window_seconds` window.
    pub async fn check(&self, key: &str, max_requests: u64, window_seconds: u64) -> bool {
        if let Some(backend) = &self.backend {
            let counter_key = format!("{}{}", RATE_LIMIT_PREFIX, key);
            match backend.incr(&counter_key).await {
                Ok(count) => {
                    if count == 1 {
                        // A failed EXPIRE leaves the counter without a deadline
                        if let Err(e) = backend.expire(&counter_key, window_seconds).await {
                            warn!(key = key, error = %e, "Failed to set rate-limit window expiry");
                        }
                    }
                    let allowed = count <= max_requests as i64;
                    debug!(key = key, count = count, allowed = allowed, "Rate limit check");
                    return allowed;
                }
                Err(e) => {
                    warn!(key = key, error = %e, "Rate-limit backend failed, using local window");
                }
            }
        }

        self.check_local(key, max_requests, window_seconds)
    }

    fn check_local(&self, key: &str, max_requests: u64, window_seconds: u64) -> bool {
        let now = Instant::now();
        let mut windows = self.local.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if windows.len() >= self.prune_threshold {
            let before = windows.len();
            windows.retain(|_, w| now < w.expires_at);
            debug!(dropped = before - windows.len(), "Pruned expired local rate-limit windows");
        }

        let window = windows
            .entry(key.to_string())
            .and_modify(|w| {
                if now >= w.expires_at {
                    *w = Window {
                        count: 0,
                        expires_at: now + Duration::from_secs(window_seconds),
                    };
                }
            })
            .or_insert(Window {
                count: 0,
                expires_at: now + Duration::from_secs(window_seconds),
            });
        window.count += 1;
        window.count <= max_requests
    }
}
