//! The load session: cache-or-fetch per key, pagination, progressive merge,
//! progress and cooperative cancellation.
//!
//! # Flow
//!
//! ```text
//! reset sink ─► resolve keys (retry once if empty)
//!                 │
//!                 ▼
//!   ┌──── for each key (window of max_concurrent_keys) ────┐
//!   │ key delay ─► cancelled? ─► fresh cache entry? ─► merge │
//!   │                               │ no                    │
//!   │                               ▼                       │
//!   │     page delay ─► cancelled? ─► fetch page ─► merge   │
//!   │        ▲                                   │          │
//!   │        └────────── continuation ───────────┘          │
//!   │                  terminal page ─► cache set           │
//!   └───────────────────────────────────────────────────────┘
//!                 │
//!                 ▼
//!   Completed ─► writeback      or      Cancelled
//! ```
//!
//! Cancellation is polled before each key and before each page fetch only.
//! A request in flight when the token fires still completes and merges.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::context::LoadContext;
use super::handle::{CancelHandle, LoadHandle};
use super::progress::ProgressEvent;
use super::state::{SessionError, SessionReport, SessionState, SessionStats};
use crate::feature::FeatureSet;
use crate::merge::MergeSink;
use crate::region::{dedup_keys, RegionKey, ResolveError};
use crate::source::{Paginator, SourceError};
use crate::writeback::spawn_writeback;

/// How one key ended.
#[derive(Debug)]
enum KeyOutcome {
    /// Served from a fresh cache entry.
    Cached { features: usize },
    /// All pages fetched.
    Fetched { features: usize },
    /// A page failed; pages merged before it stay merged.
    Failed { features: usize, error: SourceError },
    /// Cancelled between two pages of this key.
    Interrupted { features: usize },
    /// Cancelled before the key started.
    Skipped,
}

/// One load of one parent region.
pub struct LoadSession {
    parent: String,
    ctx: Arc<LoadContext>,
    sink: Arc<MergeSink>,
    cancellation: CancellationToken,
    state_tx: watch::Sender<SessionState>,
    stats: Mutex<SessionStats>,
}

impl LoadSession {
    /// Create a session in the `Init` state.
    pub fn new(parent: impl Into<String>, ctx: Arc<LoadContext>, sink: Arc<MergeSink>) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Init);
        Self {
            parent: parent.into(),
            ctx,
            sink,
            cancellation: CancellationToken::new(),
            state_tx,
            stats: Mutex::new(SessionStats::default()),
        }
    }

    /// Parent region of this session.
    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// Handle that cancels this session.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle::new(self.cancellation.clone())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    /// Subscribe to lifecycle changes.
    pub fn state_receiver(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Run the session on the current runtime and return its handle.
    pub fn spawn(self) -> LoadHandle {
        let parent = self.parent.clone();
        let cancel = self.cancel_handle();
        let state_rx = self.state_receiver();
        let task = tokio::spawn(self.run());
        LoadHandle::new(parent, cancel, state_rx, task)
    }

    /// Run the session to a terminal state.
    ///
    /// Returns the report for `Completed` and `Cancelled` sessions and an
    /// error for `Failed` ones. Merged features are never rolled back.
    pub async fn run(self) -> Result<SessionReport, SessionError> {
        let span = info_span!("load_session", parent = %self.parent);
        self.execute().instrument(span).await
    }

    async fn execute(&self) -> Result<SessionReport, SessionError> {
        self.sink.reset();
        self.set_state(SessionState::Running);

        let keys = match self.resolve_keys().await {
            Ok(Some(keys)) => keys,
            Ok(None) => return Ok(self.finish_cancelled(0)),
            Err(source) => {
                error!(error = %source, "Region key resolution failed");
                self.emit(format!("Failed to load regions for {}", self.parent), 0, 0);
                self.set_state(SessionState::Failed);
                return Err(SessionError::Resolve {
                    parent: self.parent.clone(),
                    source,
                });
            }
        };

        let total = keys.len();
        info!(keys = total, "Region keys resolved");
        self.emit(format!("Loading {} regions", total), 0, total);

        self.load_keys(&keys, total).await;

        if self.is_cancelled() {
            Ok(self.finish_cancelled(total))
        } else {
            Ok(self.finish_completed(total))
        }
    }

    /// Resolve child keys, retrying once after a delay if the set is empty.
    ///
    /// Returns `Ok(None)` if cancelled before or between attempts.
    async fn resolve_keys(&self) -> Result<Option<Vec<RegionKey>>, ResolveError> {
        if self.is_cancelled() {
            return Ok(None);
        }
        let keys = dedup_keys(self.ctx.resolver.resolve(&self.parent).await?);
        if !keys.is_empty() {
            return Ok(Some(keys));
        }

        let delay = self.ctx.config.empty_keys_retry_delay;
        debug!(
            delay_ms = delay.as_millis() as u64,
            "No region keys yet, retrying once"
        );
        self.pause(delay).await;
        if self.is_cancelled() {
            return Ok(None);
        }

        let keys = dedup_keys(self.ctx.resolver.resolve(&self.parent).await?);
        if keys.is_empty() {
            warn!("Parent region has no child keys");
        }
        Ok(Some(keys))
    }

    /// Process keys through a sliding window of per-key futures.
    ///
    /// With a window of 1 this is strictly sequential. All futures are polled
    /// by this task, so stats updates and progress events never race.
    async fn load_keys(&self, keys: &[RegionKey], total: usize) {
        let window = self.ctx.config.max_concurrent_keys.max(1);
        let mut queue = keys.iter().enumerate();
        let mut in_flight = FuturesUnordered::new();

        loop {
            while in_flight.len() < window && !self.is_cancelled() {
                match queue.next() {
                    Some((index, key)) => in_flight.push(self.load_key(index, key, total)),
                    None => break,
                }
            }

            match in_flight.next().await {
                Some((key, outcome)) => self.record(key, outcome, total),
                None => break,
            }
        }
    }

    async fn load_key<'a>(
        &'a self,
        index: usize,
        key: &'a RegionKey,
        total: usize,
    ) -> (&'a RegionKey, KeyOutcome) {
        if index > 0 {
            self.pause(self.ctx.config.key_delay).await;
        }
        if self.is_cancelled() {
            return (key, KeyOutcome::Skipped);
        }

        let span = info_span!("region", key = %key);
        let outcome = self.cache_or_fetch(key, total).instrument(span).await;
        (key, outcome)
    }

    async fn cache_or_fetch(&self, key: &RegionKey, total: usize) -> KeyOutcome {
        let config = &self.ctx.config;

        if let Some(entry) = self
            .ctx
            .cache
            .get_fresh(key, Utc::now(), config.cache_ttl)
            .await
        {
            let features = entry.features.len();
            debug!(features, "Serving region from cache");
            self.sink.append(entry.features);
            return KeyOutcome::Cached { features };
        }

        let mut paginator = Paginator::new(key.clone());
        let mut merged = 0;

        while !paginator.is_finished() {
            if paginator.pages_fetched() > 0 {
                self.pause(config.page_delay).await;
            }
            if self.is_cancelled() {
                debug!(
                    pages = paginator.pages_fetched(),
                    "Cancelled between pages"
                );
                return KeyOutcome::Interrupted { features: merged };
            }

            match paginator.next_page(self.ctx.source.as_ref()).await {
                Some(Ok(features)) => {
                    merged += features.len();
                    self.sink.append(features);
                    let loaded = {
                        let mut stats = self.stats.lock();
                        stats.network_pages += 1;
                        stats.loaded_keys
                    };
                    self.emit(
                        format!("Loading region {}: {} features", key, merged),
                        loaded,
                        total,
                    );
                }
                Some(Err(error)) => {
                    return KeyOutcome::Failed {
                        features: merged,
                        error,
                    }
                }
                None => break,
            }
        }

        debug!(
            pages = paginator.pages_fetched(),
            features = merged,
            "Region fetched"
        );
        self.ctx.cache.set(key, paginator.into_features()).await;
        KeyOutcome::Fetched { features: merged }
    }

    /// Update stats for a finished key and report progress.
    fn record(&self, key: &RegionKey, outcome: KeyOutcome, total: usize) {
        let (loaded, failed, summary) = {
            let mut stats = self.stats.lock();
            let summary = match &outcome {
                KeyOutcome::Cached { features } => {
                    stats.cached_keys += 1;
                    format!("Loaded region {} from cache ({} features)", key, features)
                }
                KeyOutcome::Fetched { features } => {
                    stats.fetched_keys += 1;
                    format!("Loaded region {} ({} features)", key, features)
                }
                KeyOutcome::Failed { features, error } => {
                    stats.failed_keys += 1;
                    warn!(
                        key = %key,
                        error = %error,
                        merged = features,
                        "Region fetch failed, skipping remaining pages"
                    );
                    format!("Failed to load region {}", key)
                }
                KeyOutcome::Interrupted { features } => {
                    debug!(key = %key, merged = features, "Region interrupted by cancellation");
                    return;
                }
                KeyOutcome::Skipped => return,
            };
            stats.loaded_keys += 1;
            (stats.loaded_keys, stats.failed_keys, summary)
        };

        let message = if failed > 0 {
            format!("{} [{}/{} regions, {} failed]", summary, loaded, total, failed)
        } else {
            format!("{} [{}/{} regions]", summary, loaded, total)
        };
        self.emit(message, loaded, total);
    }

    fn finish_completed(&self, total: usize) -> SessionReport {
        let stats = *self.stats.lock();
        let features = self.sink.snapshot();

        let mut message = format!(
            "Loaded {} features from {} regions",
            features.len(),
            total
        );
        if stats.failed_keys > 0 {
            message.push_str(&format!(", {} failed", stats.failed_keys));
        }
        self.emit(message, stats.loaded_keys, total);
        self.set_state(SessionState::Completed);

        info!(
            features = features.len(),
            cached = stats.cached_keys,
            fetched = stats.fetched_keys,
            failed = stats.failed_keys,
            pages = stats.network_pages,
            "Load session completed"
        );

        spawn_writeback(
            Arc::clone(&self.ctx.writeback),
            self.parent.clone(),
            features.clone(),
        );

        self.report(SessionState::Completed, total, stats, features)
    }

    fn finish_cancelled(&self, total: usize) -> SessionReport {
        let stats = *self.stats.lock();
        let features = self.sink.snapshot();

        self.ctx.progress.emit(&ProgressEvent::cleared(
            self.parent.clone(),
            stats.loaded_keys,
            total,
        ));
        self.set_state(SessionState::Cancelled);

        info!(
            features = features.len(),
            loaded = stats.loaded_keys,
            total,
            "Load session cancelled"
        );

        self.report(SessionState::Cancelled, total, stats, features)
    }

    fn report(
        &self,
        state: SessionState,
        total_keys: usize,
        stats: SessionStats,
        features: FeatureSet,
    ) -> SessionReport {
        SessionReport {
            parent: self.parent.clone(),
            state,
            total_keys,
            stats,
            features,
        }
    }

    fn emit(&self, message: String, loaded: usize, total: usize) {
        self.ctx.progress.emit(&ProgressEvent::new(
            self.parent.clone(),
            message,
            loaded,
            total,
        ));
    }

    fn set_state(&self, state: SessionState) {
        debug!(state = %state, "Session state");
        self.state_tx.send_replace(state);
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Cooperative delay; returns early when the session is cancelled.
    async fn pause(&self, delay: Duration) {
        if delay.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = self.cancellation.cancelled() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCacheProvider, RegionCacheClient};
    use crate::feature::SourceFeature;
    use crate::region::StaticResolver;
    use crate::source::{BoxFuture, Page, RemoteSource};
    use serde_json::json;

    /// Source serving `n` single-feature pages per key.
    struct CountingSource {
        pages_per_key: usize,
        calls: Mutex<usize>,
    }

    impl RemoteSource for CountingSource {
        fn fetch_page<'a>(
            &'a self,
            _key: &'a RegionKey,
            cursor: Option<&'a str>,
        ) -> BoxFuture<'a, Result<Page, SourceError>> {
            *self.calls.lock() += 1;
            let index: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
            let feature = SourceFeature::new(json!(null), Default::default());
            let page = if index + 1 < self.pages_per_key {
                Page::with_continuation(vec![feature], (index + 1).to_string())
            } else {
                Page::last(vec![feature])
            };
            Box::pin(async move { Ok(page) })
        }
    }

    fn context(pages_per_key: usize, keys: &[&str]) -> (Arc<LoadContext>, Arc<CountingSource>) {
        let source = Arc::new(CountingSource {
            pages_per_key,
            calls: Mutex::new(0),
        });
        let resolver = StaticResolver::new().with_parent("P", keys.iter().copied());
        let cache = RegionCacheClient::new(
            Arc::new(MemoryCacheProvider::new(1_000_000, None)),
            "test",
        );
        let ctx = LoadContext::new(Arc::new(resolver), source.clone(), cache);
        (Arc::new(ctx), source)
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_walks_every_page() {
        let (ctx, source) = context(3, &["a", "b"]);
        let session = LoadSession::new("P", ctx, Arc::new(MergeSink::detached("P")));

        let report = session.run().await.unwrap();

        assert!(report.is_completed());
        assert_eq!(report.features.len(), 6);
        assert_eq!(report.stats.network_pages, 6);
        assert_eq!(report.stats.fetched_keys, 2);
        assert_eq!(*source.calls.lock(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_keys_fetched_once() {
        let (ctx, source) = context(1, &["a", "a", "b", "a"]);
        let session = LoadSession::new("P", ctx, Arc::new(MergeSink::detached("P")));

        let report = session.run().await.unwrap();

        assert_eq!(report.total_keys, 2);
        assert_eq!(*source.calls.lock(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_start_issues_no_calls() {
        let (ctx, source) = context(1, &["a"]);
        let session = LoadSession::new("P", ctx, Arc::new(MergeSink::detached("P")));
        session.cancel_handle().cancel();

        let report = session.run().await.unwrap();

        assert_eq!(report.state, SessionState::Cancelled);
        assert_eq!(*source.calls.lock(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_transitions_visible_to_receiver() {
        let (ctx, _) = context(1, &["a"]);
        let session = LoadSession::new("P", ctx, Arc::new(MergeSink::detached("P")));
        let rx = session.state_receiver();
        assert_eq!(session.state(), SessionState::Init);

        let handle = session.spawn();
        assert_eq!(handle.wait_terminal().await, SessionState::Completed);
        assert_eq!(*rx.borrow(), SessionState::Completed);
        assert!(handle.join().await.unwrap().is_completed());
    }
}
