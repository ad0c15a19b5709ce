//! Cache Key Builder
//!
//! Every cache key is `v{N}:{namespace}:{identifiers}[:{suffix}]`. Bumping
//! [`CACHE_VERSION`] orphans all previously written keys, so key shapes can
//! change without flushing the backend.
//!
//! # Namespaces
//! - `property:{id}` - single listing
//! - `properties:list[:...]` - global listing pages
//! - `seller:{id}:list[:...]` - one seller's listing pages
//! - `session:{user_id}` - session payloads
//! - `ref:{name}` - static reference data
//!
//! Identifiers are written into keys as given. Pattern builders escape them,
//! so an id such as `a[1]` or `x*` only ever matches itself.

use std::collections::HashSet;

use crate::cache::pattern::escape_glob;
use crate::cache::semantic::semantic_list_key;
use crate::property::PropertyRow;

/// Key-shape version embedded in every key.
pub const CACHE_VERSION: u32 = 1;

/// The key-shape version this build writes.
pub fn cache_version() -> u32 {
    CACHE_VERSION
}

/// Which scopes [`CacheKeys::property_invalidation_patterns`] covers.
#[derive(Debug, Clone, Copy)]
pub struct InvalidationScope {
    pub include_global: bool,
    pub include_seller: bool,
}

impl Default for InvalidationScope {
    fn default() -> Self {
        Self {
            include_global: true,
            include_seller: true,
        }
    }
}

// == Cache Keys ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheKeys {
    version: u32,
}

impl Default for CacheKeys {
    fn default() -> Self {
        Self::with_version(CACHE_VERSION)
    }
}

impl CacheKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder for an explicit key-shape version.
    pub fn with_version(version: u32) -> Self {
        Self { version }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    fn ns(&self, rest: &str) -> String {
        format!("v{}:{}", self.version, rest)
    }

    /// `v1:property:{id}`
    pub fn property(&self, id: &str) -> String {
        self.ns(&format!("property:{}", id))
    }

    /// `v1:property:*`
    pub fn property_pattern(&self) -> String {
        self.ns("property:*")
    }

    /// Global listing pages.
    pub fn properties(&self) -> ListKeys {
        ListKeys::new(self.ns("properties:list"))
    }

    /// `v1:properties:*`
    pub fn properties_namespace_pattern(&self) -> String {
        self.ns("properties:*")
    }

    /// Listing pages of one seller.
    pub fn seller(&self, seller_id: &str) -> ListKeys {
        ListKeys::new(self.ns(&format!("seller:{}:list", seller_id)))
    }

    /// `v1:seller:*`, every seller at once.
    pub fn seller_namespace_pattern(&self) -> String {
        self.ns("seller:*")
    }

    /// `v1:session:{user_id}`
    pub fn session(&self, user_id: &str) -> String {
        self.ns(&format!("session:{}", user_id))
    }

    pub fn session_pattern(&self) -> String {
        self.ns("session:*")
    }

    /// `v1:ref:{name}` for static reference lists (cities, property types...).
    pub fn reference(&self, name: &str) -> String {
        self.ns(&format!("ref:{}", token(name)))
    }

    pub fn reference_pattern(&self) -> String {
        self.ns("ref:*")
    }

    // == Property Invalidation Patterns ==
    /// Minimal set of globs covering every cached list that can show `property`.
    ///
    /// Per included scope: the list pattern, the bare list key (which the
    /// `list:*` pattern does not reach), then zone- and operation-scoped
    /// variants when the row carries those attributes. The seller scope is
    /// skipped when the row has no seller.
    pub fn property_invalidation_patterns(
        &self,
        property: &PropertyRow,
        scope: InvalidationScope,
    ) -> Vec<String> {
        let mut patterns = PatternSet::default();
        let city = property.city.as_deref().map(token).filter(|c| !c.is_empty());
        let operation = property.operation_slug();

        let mut scopes = Vec::new();
        if scope.include_global {
            scopes.push(self.properties());
        }
        if scope.include_seller {
            if let Some(seller_id) = property.seller_id.as_deref().filter(|s| !s.is_empty()) {
                scopes.push(self.seller(seller_id));
            }
        }

        for lists in &scopes {
            patterns.insert(lists.list_pattern());
            patterns.insert(lists.list_exact());
            if let Some(city) = &city {
                patterns.insert(lists.list_by_zone(city));
            }
            if let Some(operation) = operation {
                patterns.insert(lists.list_by_operation(operation));
            }
        }

        patterns.into_vec()
    }

    // == Affected Cache Patterns ==
    /// Coarse invalidation set for image changes.
    ///
    /// Image mutations arrive without the filter context of the listing, so
    /// this clears every list namespace wholesale, the listing itself, and
    /// attribute-scoped globs for city, operation, price, bedrooms and type.
    pub fn affected_cache_patterns(&self, property: &PropertyRow) -> Vec<String> {
        let mut patterns = PatternSet::default();
        patterns.insert(self.properties_namespace_pattern());
        patterns.insert(self.seller_namespace_pattern());

        if !property.id.is_empty() {
            patterns.insert(escape_glob(&self.property(&property.id)));
        }
        if let Some(city) = property.city.as_deref().map(token).filter(|c| !c.is_empty()) {
            patterns.insert(self.ns(&format!("*zone={}*", escape_glob(&city))));
        }
        if let Some(operation) = property.operation_slug() {
            patterns.insert(self.ns(&format!("*op={}*", operation)));
        }
        if property.price.is_some() {
            patterns.insert(self.ns("*pmin=*"));
            patterns.insert(self.ns("*pmax=*"));
        }
        if let Some(bedrooms) = property.bedrooms {
            patterns.insert(self.ns(&format!("*beds={}*", bedrooms)));
        }
        if let Some(kind) = property.property_type.as_deref().map(token).filter(|t| !t.is_empty()) {
            patterns.insert(self.ns(&format!("*type={}*", escape_glob(&kind))));
        }

        patterns.into_vec()
    }
}

// == List Keys ==
/// Keys and patterns for one listing namespace (global or per seller).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListKeys {
    base: String,
}

impl ListKeys {
    fn new(base: String) -> Self {
        Self { base }
    }

    /// Unfiltered first page, e.g. `v1:properties:list`.
    pub fn list(&self) -> String {
        self.base.clone()
    }

    /// Glob reaching only the unfiltered first page.
    pub fn list_exact(&self) -> String {
        escape_glob(&self.base)
    }

    /// Every filtered page, e.g. `v1:properties:list:*`.
    pub fn list_pattern(&self) -> String {
        format!("{}:*", escape_glob(&self.base))
    }

    /// Pages filtered by city, e.g. `v1:properties:list:*zone=palermo*`.
    pub fn list_by_zone(&self, city: &str) -> String {
        format!("{}:*zone={}*", escape_glob(&self.base), escape_glob(&token(city)))
    }

    /// Pages filtered by operation, e.g. `v1:properties:list:*op=sale*`.
    pub fn list_by_operation(&self, operation: &str) -> String {
        format!("{}:*op={}*", escape_glob(&self.base), escape_glob(&token(operation)))
    }

    /// Semantic key for a filtered page.
    pub fn filtered<'a, I>(&self, filters: I) -> String
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        semantic_list_key(&self.base, filters)
    }
}

fn token(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Insertion-ordered, de-duplicated pattern collection.
#[derive(Default)]
struct PatternSet {
    seen: HashSet<String>,
    ordered: Vec<String>,
}

impl PatternSet {
    fn insert(&mut self, pattern: String) {
        if self.seen.insert(pattern.clone()) {
            self.ordered.push(pattern);
        }
    }

    fn into_vec(self) -> Vec<String> {
        self.ordered
    }
}
