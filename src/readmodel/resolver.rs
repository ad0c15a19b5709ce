//! Image URL resolution
//!
//! Image rows store either absolute URLs or storage object paths. The
//! resolver turns paths into public URLs; a failure for one image never
//! aborts a sync (the caller keeps the original URL).

use async_trait::async_trait;
use url::Url;

use crate::error::{CacheError, Result};

#[async_trait]
pub trait ImageResolver: Send + Sync {
    async fn resolve(&self, raw_url: &str) -> Result<String>;
}

/// Prefixes storage paths with a public base URL; absolute URLs pass through.
#[derive(Debug, Clone)]
pub struct PublicUrlResolver {
    base: Option<Url>,
}

impl PublicUrlResolver {
    /// `base` is the public bucket URL, e.g. `https://cdn.example.com/listings/`.
    pub fn new(base: Option<&str>) -> Result<Self> {
        let base = base
            .map(|b| {
                // Url::join replaces the last segment unless the base ends in '/'
                let normalized = if b.ends_with('/') { b.to_string() } else { format!("{}/", b) };
                Url::parse(&normalized)
                    .map_err(|e| CacheError::Config(format!("invalid storage public URL '{}': {}", b, e)))
            })
            .transpose()?;
        Ok(Self { base })
    }
}

#[async_trait]
impl ImageResolver for PublicUrlResolver {
    async fn resolve(&self, raw_url: &str) -> Result<String> {
        if let Ok(absolute) = Url::parse(raw_url) {
            return Ok(absolute.to_string());
        }

        let base = self.base.as_ref().ok_or_else(|| {
            CacheError::InvalidRequest(format!("no storage base URL to resolve '{}'", raw_url))
        })?;
        base.join(raw_url.trim_start_matches('/'))
            .map(|url| url.to_string())
            .map_err(|e| CacheError::InvalidRequest(format!("cannot resolve '{}': {}", raw_url, e)))
    }
}
