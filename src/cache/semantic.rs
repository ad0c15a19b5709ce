//! Semantic list keys
//!
//! Filtered list queries get keys of the form
//! `{base}:{readable}:{hash}` where `readable` carries the filters that
//! invalidation patterns target (`zone=..|op=..|beds=..|pmin=..|pmax=..`) and
//! `hash` is the first 8 hex chars of an MD5 over every normalized filter, so
//! combinations outside the readable subset still get distinct keys.

use std::collections::BTreeMap;
use std::fmt;

/// Readable prefix tokens, in output order.
const PRIORITY_FILTERS: [&str; 5] = ["zone", "op", "beds", "pmin", "pmax"];

/// A filter value after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Number(n) => write!(f, "{}", n),
            FilterValue::Text(s) => f.write_str(s),
        }
    }
}

/// Maps incoming filter names onto the token names used in keys.
fn canonical_name(name: &str) -> String {
    match name.trim().to_lowercase().as_str() {
        "zone" | "city" => "zone".to_string(),
        "op" | "operation" | "operation_status_id" => "op".to_string(),
        "beds" | "bedrooms" => "beds".to_string(),
        "pmin" | "min_price" | "minprice" => "pmin".to_string(),
        "pmax" | "max_price" | "maxprice" => "pmax".to_string(),
        other => other.to_string(),
    }
}

/// Parses numeric strings, lower-cases the rest and drops empty values.
///
/// Operation ids `1`/`2` become `sale`/`rent` so operation-scoped
/// invalidation patterns match regardless of how the filter was sent.
pub fn normalize_filters<'a, I>(filters: I) -> BTreeMap<String, FilterValue>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut normalized = BTreeMap::new();
    for (name, value) in filters {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        let name = canonical_name(name);

        let normalized_value = if name == "op" {
            FilterValue::Text(match value {
                "1" => "sale".to_string(),
                "2" => "rent".to_string(),
                other => other.to_lowercase(),
            })
        } else {
            match value.parse::<f64>() {
                Ok(n) if n.is_finite() => FilterValue::Number(n),
                _ => FilterValue::Text(value.to_lowercase()),
            }
        };
        normalized.insert(name, normalized_value);
    }
    normalized
}

/// First 8 hex chars of MD5 over `k=v&k=v` in key order.
pub fn filter_hash(filters: &BTreeMap<String, FilterValue>) -> String {
    let canonical = filters
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("&");
    let digest = format!("{:x}", md5::compute(canonical.as_bytes()));
    digest[..8].to_string()
}

/// Builds the key for a filtered list under `base`.
pub fn semantic_list_key<'a, I>(base: &str, filters: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let normalized = normalize_filters(filters);
    if normalized.is_empty() {
        return base.to_string();
    }

    let readable = PRIORITY_FILTERS
        .iter()
        .filter_map(|name| normalized.get(*name).map(|value| format!("{}={}", name, value)))
        .collect::<Vec<_>>()
        .join("|");
    let hash = filter_hash(&normalized);

    if readable.is_empty() {
        format!("{}:{}", base, hash)
    } else {
        format!("{}:{}:{}", base, readable, hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::pattern::glob_matches;

    const BASE: &str = "v1:properties:list";

    #[test]
    fn test_no_filters_is_plain_list_key() {
        assert_eq!(semantic_list_key(BASE, std::iter::empty()), BASE);
        assert_eq!(semantic_list_key(BASE, [("zone", "  ")]), BASE);
    }

    #[test]
    fn test_normalization() {
        let normalized = normalize_filters([("City", " Palermo "), ("min_price", "100000"), ("q", "Pool")]);

        assert_eq!(normalized.get("zone"), Some(&FilterValue::Text("palermo".to_string())));
        assert_eq!(normalized.get("pmin"), Some(&FilterValue::Number(100000.0)));
        assert_eq!(normalized.get("q"), Some(&FilterValue::Text("pool".to_string())));
    }

    #[test]
    fn test_operation_ids_become_slugs() {
        let normalized = normalize_filters([("operation", "2")]);
        assert_eq!(normalized.get("op"), Some(&FilterValue::Text("rent".to_string())));
    }

    #[test]
    fn test_readable_prefix_and_hash() {
        let key = semantic_list_key(BASE, [("max_price", "200000"), ("zone", "Palermo"), ("operation", "sale")]);

        let rest = key.strip_prefix("v1:properties:list:").unwrap();
        let (readable, hash) = rest.rsplit_once(':').unwrap();
        assert_eq!(readable, "zone=palermo|op=sale|pmax=200000");
        assert_eq!(hash.len(), 8);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_equivalent_filters_share_a_key() {
        let a = semantic_list_key(BASE, [("zone", "PALERMO"), ("min_price", "100000")]);
        let b = semantic_list_key(BASE, [("min_price", "100000.0"), ("city", "palermo")]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_non_priority_filters_change_only_the_hash() {
        let a = semantic_list_key(BASE, [("zone", "palermo"), ("q", "pool")]);
        let b = semantic_list_key(BASE, [("zone", "palermo"), ("q", "garden")]);
        assert_ne!(a, b);
        assert!(a.starts_with("v1:properties:list:zone=palermo:"));
        assert!(b.starts_with("v1:properties:list:zone=palermo:"));
    }

    #[test]
    fn test_hash_only_key_when_no_priority_filters() {
        let key = semantic_list_key(BASE, [("q", "pool")]);
        let hash = key.strip_prefix("v1:properties:list:").unwrap();
        assert_eq!(hash.len(), 8);
    }

    #[test]
    fn test_keys_reachable_by_scoped_patterns() {
        let key = semantic_list_key(BASE, [("zone", "Palermo"), ("operation", "1")]);
        assert!(glob_matches("v1:properties:list:*zone=palermo*", &key));
        assert!(glob_matches("v1:properties:list:*op=sale*", &key));
        assert!(glob_matches("v1:properties:list:*", &key));
    }
}
