//! Timestamped cache entries and the staleness rule.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::feature::SourceFeature;
use crate::region::RegionKey;

/// Entries older than this are refetched.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// The complete feature set of one region key, as last fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Region key the features belong to.
    pub key: RegionKey,

    /// Features in arrival order.
    pub features: Vec<SourceFeature>,

    /// When the features were fetched from the network.
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Create an entry stamped with the current time.
    pub fn new(key: RegionKey, features: Vec<SourceFeature>) -> Self {
        Self::fetched_at(key, features, Utc::now())
    }

    /// Create an entry with an explicit fetch time.
    pub fn fetched_at(key: RegionKey, features: Vec<SourceFeature>, at: DateTime<Utc>) -> Self {
        Self {
            key,
            features,
            fetched_at: at,
        }
    }

    /// Age of the entry at `now`.
    pub fn age_at(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.fetched_at
    }

    /// An entry is fresh iff `now - fetched_at < ttl`.
    pub fn is_fresh_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        self.age_at(now) < ttl
    }
}
