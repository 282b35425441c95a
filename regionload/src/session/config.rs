//! Load session configuration.

use std::time::Duration;

use crate::cache::DEFAULT_CACHE_TTL;

/// Default pause between successive page fetches of one key.
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(50);

/// Default pause between keys.
pub const DEFAULT_KEY_DELAY: Duration = Duration::from_millis(100);

/// Default wait before re-resolving an empty key set.
pub const DEFAULT_EMPTY_KEYS_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Tuning knobs for load sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Pause between successive page fetches for the same key.
    pub page_delay: Duration,

    /// Pause before starting each key after the first.
    pub key_delay: Duration,

    /// Maximum age of a usable cache entry.
    pub cache_ttl: Duration,

    /// Wait before the single retry when key resolution returns nothing.
    pub empty_keys_retry_delay: Duration,

    /// Keys processed concurrently. `1` is strictly sequential.
    pub max_concurrent_keys: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            page_delay: DEFAULT_PAGE_DELAY,
            key_delay: DEFAULT_KEY_DELAY,
            cache_ttl: DEFAULT_CACHE_TTL,
            empty_keys_retry_delay: DEFAULT_EMPTY_KEYS_RETRY_DELAY,
            max_concurrent_keys: 1,
        }
    }
}

impl LoaderConfig {
    /// Set both cooperative delays.
    pub fn with_delays(mut self, page_delay: Duration, key_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self.key_delay = key_delay;
        self
    }

    /// Set the cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the empty key set retry delay.
    pub fn with_empty_keys_retry_delay(mut self, delay: Duration) -> Self {
        self.empty_keys_retry_delay = delay;
        self
    }

    /// Set the number of concurrently processed keys (minimum 1).
    pub fn with_max_concurrent_keys(mut self, n: usize) -> Self {
        self.max_concurrent_keys = n.max(1);
        self
    }

    /// Returns true when keys run one at a time.
    pub fn is_sequential(&self) -> bool {
        self.max_concurrent_keys <= 1
    }
}
