//! Region keys, partitions and key resolution.
//!
//! A parent region (e.g. a municipality) is loaded as a set of child
//! fetch-granularity keys (e.g. 4-digit postal prefixes). The
//! [`RegionKeyResolver`] produces that ordered set once per session start.

mod http;

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::source::BoxFuture;

pub use http::HttpKeyResolver;

/// Default number of features requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// Opaque identifier of a fetch-granularity unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionKey(String);

impl RegionKey {
    /// Create a key from any string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegionKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RegionKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A region partition type: key namespace plus paging parameters.
///
/// Different partition types (postal prefixes, districts, ...) share one
/// loader; the partition name namespaces cache keys and endpoint paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Partition name, e.g. `postcode4`.
    pub name: String,
    /// Features requested per page.
    pub page_size: usize,
}

impl Partition {
    /// Create a partition; page size is clamped to at least 1.
    pub fn new(name: impl Into<String>, page_size: usize) -> Self {
        Self {
            name: name.into(),
            page_size: page_size.max(1),
        }
    }
}

/// Key resolution failure. Fatal for the session that hit it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// The parent region is not known to the resolver.
    #[error("unknown parent region: {0}")]
    UnknownParent(String),

    /// The key source could not be reached.
    #[error("key source unavailable: {0}")]
    Unavailable(String),

    /// The key source answered with something unreadable.
    #[error("invalid key list: {0}")]
    InvalidResponse(String),
}

/// Resolves a parent region into its ordered child keys.
pub trait RegionKeyResolver: Send + Sync {
    /// Resolve `parent` into child keys, in load order.
    fn resolve<'a>(&'a self, parent: &'a str) -> BoxFuture<'a, Result<Vec<RegionKey>, ResolveError>>;
}

/// Removes repeated keys, keeping the first occurrence.
pub fn dedup_keys(keys: Vec<RegionKey>) -> Vec<RegionKey> {
    let mut seen = HashSet::with_capacity(keys.len());
    keys.into_iter().filter(|k| seen.insert(k.clone())).collect()
}

/// In-memory resolver backed by a fixed table.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    table: HashMap<String, Vec<RegionKey>>,
}

impl StaticResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the child keys of a parent.
    pub fn with_parent<I, K>(mut self, parent: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<RegionKey>,
    {
        self.table
            .insert(parent.into(), keys.into_iter().map(Into::into).collect());
        self
    }
}

impl RegionKeyResolver for StaticResolver {
    fn resolve<'a>(&'a self, parent: &'a str) -> BoxFuture<'a, Result<Vec<RegionKey>, ResolveError>> {
        let result = self
            .table
            .get(parent)
            .cloned()
            .ok_or_else(|| ResolveError::UnknownParent(parent.to_string()));
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_key_display() {
        let key = RegionKey::from("1011");
        assert_eq!(key.to_string(), "1011");
        assert_eq!(key.as_str(), "1011");
    }

    #[test]
    fn test_region_key_serializes_as_string() {
        let json = serde_json::to_string(&RegionKey::from("1011")).unwrap();
        assert_eq!(json, "\"1011\"");
    }

    #[test]
    fn test_partition_min_page_size() {
        assert_eq!(Partition::new("postcode4", 0).page_size, 1);
    }

    #[test]
    fn test_dedup_keys_preserves_order() {
        let keys = vec!["1012".into(), "1011".into(), "1012".into(), "1013".into()];
        let deduped = dedup_keys(keys);
        let names: Vec<&str> = deduped.iter().map(RegionKey::as_str).collect();
        assert_eq!(names, vec!["1012", "1011", "1013"]);
    }

    #[tokio::test]
    async fn test_static_resolver() {
        let resolver = StaticResolver::new().with_parent("0363", ["1011", "1012"]);

        let keys = resolver.resolve("0363").await.unwrap();
        assert_eq!(keys, vec![RegionKey::from("1011"), RegionKey::from("1012")]);

        let err = resolver.resolve("9999").await.unwrap_err();
        assert_eq!(err, ResolveError::UnknownParent("9999".to_string()));
    }
}
