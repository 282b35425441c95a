//! Collaborators shared by every session of a loader.

use std::sync::Arc;

use super::config::LoaderConfig;
use super::progress::ProgressReporter;
use crate::cache::RegionCacheClient;
use crate::region::RegionKeyResolver;
use crate::source::RemoteSource;
use crate::writeback::{CacheWriteback, NoWriteback};

/// Everything a load session talks to.
///
/// One context serves one partition type: its resolver, source and cache
/// namespace all belong to that partition.
#[derive(Clone)]
pub struct LoadContext {
    /// Parent → child key resolution.
    pub resolver: Arc<dyn RegionKeyResolver>,
    /// Paginated feature source.
    pub source: Arc<dyn RemoteSource>,
    /// Persistent per-key cache.
    pub cache: RegionCacheClient,
    /// Server-side writeback of completed merges.
    pub writeback: Arc<dyn CacheWriteback>,
    /// Progress fan-out.
    pub progress: ProgressReporter,
    /// Delays, TTL and concurrency.
    pub config: LoaderConfig,
}

impl LoadContext {
    /// Create a context with default config, no writeback and no progress
    /// subscribers.
    pub fn new(
        resolver: Arc<dyn RegionKeyResolver>,
        source: Arc<dyn RemoteSource>,
        cache: RegionCacheClient,
    ) -> Self {
        Self {
            resolver,
            source,
            cache,
            writeback: Arc::new(NoWriteback),
            progress: ProgressReporter::new(),
            config: LoaderConfig::default(),
        }
    }

    /// Use the given writeback.
    pub fn with_writeback(mut self, writeback: Arc<dyn CacheWriteback>) -> Self {
        self.writeback = writeback;
        self
    }

    /// Use the given progress reporter.
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Use the given loader config.
    pub fn with_config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }
}
