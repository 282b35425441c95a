//! Region cache client: the loader's persistent cache.
//!
//! This client wraps a generic `Cache` with:
//! - Key translation: `(partition, RegionKey)` → `"{partition}:{key}"`
//! - Value encoding: [`CacheEntry`] as JSON
//! - Fail-soft semantics: storage and decoding failures are logged and
//!   reported as a miss (`get`) or swallowed (`set`)
//!
//! The TTL check belongs to the caller: [`get`](RegionCacheClient::get) returns
//! whatever is stored, [`get_fresh`](RegionCacheClient::get_fresh) applies the
//! staleness rule at a given instant.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::cache::entry::CacheEntry;
use crate::cache::traits::{Cache, ServiceCacheError};
use crate::feature::SourceFeature;
use crate::region::RegionKey;

/// Persistent cache of per-key feature sets.
#[derive(Clone)]
pub struct RegionCacheClient {
    /// The underlying generic cache.
    cache: Arc<dyn Cache>,

    /// Namespace prefix for keys.
    partition: String,
}

impl RegionCacheClient {
    /// Create a client for one partition.
    ///
    /// # Arguments
    ///
    /// * `cache` - The underlying cache implementation
    /// * `partition` - Partition name used as key namespace
    pub fn new(cache: Arc<dyn Cache>, partition: impl Into<String>) -> Self {
        Self {
            cache,
            partition: partition.into(),
        }
    }

    /// Look up the stored entry for a key, stale or not.
    ///
    /// Any storage or decoding failure is treated as a miss.
    pub async fn get(&self, key: &RegionKey) -> Option<CacheEntry> {
        let cache_key = self.cache_key(key);
        match self.try_get(&cache_key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, key = %cache_key, "Region cache get failed, treating as miss");
                None
            }
        }
    }

    /// Look up an entry that is still fresh at `now`.
    pub async fn get_fresh(
        &self,
        key: &RegionKey,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Option<CacheEntry> {
        let entry = self.get(key).await?;
        if entry.is_fresh_at(now, ttl) {
            Some(entry)
        } else {
            debug!(
                key = %key,
                age_secs = entry.age_at(now).num_seconds(),
                "Region cache entry is stale"
            );
            None
        }
    }

    /// Store the complete feature set of a key, stamped with the current time.
    ///
    /// Failures are logged and ignored; the caller only loses the cache benefit.
    pub async fn set(&self, key: &RegionKey, features: Vec<SourceFeature>) {
        self.put(CacheEntry::new(key.clone(), features)).await;
    }

    /// Store a prepared entry (overwrites).
    pub async fn put(&self, entry: CacheEntry) {
        let cache_key = self.cache_key(&entry.key);
        let result = match serde_json::to_vec(&entry) {
            Ok(bytes) => self.cache.set(&cache_key, bytes).await,
            Err(e) => Err(ServiceCacheError::Serialization(e.to_string())),
        };
        if let Err(e) = result {
            warn!(error = %e, key = %cache_key, "Region cache set failed");
        }
    }

    async fn try_get(&self, cache_key: &str) -> Result<Option<CacheEntry>, ServiceCacheError> {
        let Some(bytes) = self.cache.get(cache_key).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| ServiceCacheError::Serialization(e.to_string()))
    }

    /// Convert a region key to its cache key.
    fn cache_key(&self, key: &RegionKey) -> String {
        format!("{}:{}", self.partition, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::providers::MemoryCacheProvider;
    use crate::cache::traits::BoxFuture;
    use chrono::TimeDelta;
    use serde_json::json;

    fn feature(n: i64) -> SourceFeature {
        SourceFeature::new(json!(null), [("n".to_string(), json!(n))].into_iter().collect())
    }

    fn client() -> (Arc<MemoryCacheProvider>, RegionCacheClient) {
        let provider = Arc::new(MemoryCacheProvider::new(1_000_000, None));
        let client = RegionCacheClient::new(provider.clone(), "postcode4");
        (provider, client)
    }

    /// Cache whose every operation fails.
    struct BrokenCache;

    impl Cache for BrokenCache {
        fn set(&self, _key: &str, _value: Vec<u8>) -> BoxFuture<'_, Result<(), ServiceCacheError>> {
            Box::pin(async { Err(ServiceCacheError::Provider("disk full".into())) })
        }
        fn get(&self, _key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, ServiceCacheError>> {
            Box::pin(async { Err(ServiceCacheError::Provider("unreadable".into())) })
        }
        fn delete(&self, _key: &str) -> BoxFuture<'_, Result<bool, ServiceCacheError>> {
            Box::pin(async { Ok(false) })
        }
        fn contains(&self, _key: &str) -> BoxFuture<'_, Result<bool, ServiceCacheError>> {
            Box::pin(async { Ok(false) })
        }
        fn entry_count(&self) -> u64 {
            0
        }
    }

    #[test]
    fn test_cache_key_format() {
        let (_, client) = client();
        assert_eq!(client.cache_key(&RegionKey::from("1011")), "postcode4:1011");
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let (provider, client) = client();
        let key = RegionKey::from("1011");

        client.set(&key, vec![feature(1), feature(2)]).await;

        let entry = client.get(&key).await.unwrap();
        assert_eq!(entry.key, key);
        assert_eq!(entry.features, vec![feature(1), feature(2)]);
        assert!(provider.contains("postcode4:1011").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_fresh_respects_ttl() {
        let (_, client) = client();
        let key = RegionKey::from("1011");
        let now = Utc::now();
        client
            .put(CacheEntry::fetched_at(key.clone(), vec![feature(1)], now - TimeDelta::hours(25)))
            .await;

        assert!(client.get(&key).await.is_some());
        assert!(client
            .get_fresh(&key, now, Duration::from_secs(24 * 3600))
            .await
            .is_none());
        assert!(client
            .get_fresh(&key, now, Duration::from_secs(26 * 3600))
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let (provider, client) = client();
        provider
            .set("postcode4:1011", b"not json".to_vec())
            .await
            .unwrap();

        assert!(client.get(&RegionKey::from("1011")).await.is_none());
    }

    #[tokio::test]
    async fn test_storage_failures_fail_soft() {
        let client = RegionCacheClient::new(Arc::new(BrokenCache), "postcode4");
        let key = RegionKey::from("1011");

        client.set(&key, vec![feature(1)]).await;
        assert!(client.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_partitions_do_not_collide() {
        let provider: Arc<dyn Cache> = Arc::new(MemoryCacheProvider::new(1_000_000, None));
        let postal = RegionCacheClient::new(provider.clone(), "postcode4");
        let district = RegionCacheClient::new(provider, "district");
        let key = RegionKey::from("1011");

        postal.set(&key, vec![feature(1)]).await;
        assert!(district.get(&key).await.is_none());
    }
}
