//! Entry point for loading parent regions.
//!
//! [`RegionLoader`] owns the shared collaborators and keeps at most one active
//! session per parent region. Each parent has its own [`MergeSink`], reused
//! across sessions for that parent, and the renderer receives every parent's
//! collection under that parent's key. A parent's sink lives until
//! [`RegionLoader::release`] drops it.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};

use crate::feature::FeatureSet;
use crate::merge::{MergeSink, NullRenderSink, RenderSink};
use crate::session::{
    wait_terminal, CancelHandle, LoadContext, LoadHandle, LoadSession, ProgressEvent,
    SessionState,
};

/// Bookkeeping for the session currently owning a parent's sink.
struct ActiveSession {
    cancel: CancelHandle,
    state_rx: watch::Receiver<SessionState>,
}

impl ActiveSession {
    fn is_running(&self) -> bool {
        !self.state_rx.borrow().is_terminal()
    }
}

/// Starts and supersedes load sessions.
pub struct RegionLoader {
    ctx: Arc<LoadContext>,
    renderer: Arc<dyn RenderSink>,
    sinks: DashMap<String, Arc<MergeSink>>,
    active: DashMap<String, ActiveSession>,
    /// Makes supersede-then-start atomic for one parent.
    parent_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RegionLoader {
    /// Create a loader that publishes merged snapshots to `renderer`.
    pub fn new(ctx: LoadContext, renderer: Arc<dyn RenderSink>) -> Self {
        Self {
            ctx: Arc::new(ctx),
            renderer,
            sinks: DashMap::new(),
            active: DashMap::new(),
            parent_locks: DashMap::new(),
        }
    }

    /// Create a loader without a renderer.
    pub fn detached(ctx: LoadContext) -> Self {
        Self::new(ctx, Arc::new(NullRenderSink))
    }

    /// Shared session context.
    pub fn context(&self) -> &LoadContext {
        &self.ctx
    }

    /// Register a progress callback for every session of this loader.
    pub fn on_progress<F>(&self, callback: F)
    where
        F: Fn(&ProgressEvent) + Send + Sync + 'static,
    {
        self.ctx.progress.subscribe(callback);
    }

    /// Start loading `parent`.
    ///
    /// A session already running for the same parent is cancelled first, and
    /// the new session starts only once the old one reached a terminal state.
    /// Sessions for different parents run independently; waiting on one
    /// parent's superseded session never delays another parent.
    pub async fn start_load(&self, parent: impl Into<String>) -> LoadHandle {
        let parent = parent.into();
        let lock = self.parent_lock(&parent);
        let _guard = lock.lock().await;

        self.stop(&parent).await;
        self.prune_finished();

        let session = LoadSession::new(parent.clone(), Arc::clone(&self.ctx), self.sink(&parent));
        self.active.insert(
            parent,
            ActiveSession {
                cancel: session.cancel_handle(),
                state_rx: session.state_receiver(),
            },
        );
        session.spawn()
    }

    /// Cancel the active session for `parent`.
    ///
    /// Returns true if a running session was signalled.
    pub fn cancel(&self, parent: &str) -> bool {
        match self.active.get(parent) {
            Some(active) if active.is_running() => {
                active.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Cancel every running session.
    pub fn cancel_all(&self) {
        for active in self.active.iter() {
            active.cancel.cancel();
        }
    }

    /// Drop everything held for `parent`.
    ///
    /// A running session is cancelled and awaited first. The renderer then
    /// receives an empty collection for `parent`. Returns true if the parent
    /// had merged features or a session.
    pub async fn release(&self, parent: &str) -> bool {
        let lock = self.parent_lock(parent);
        let released = {
            let _guard = lock.lock().await;
            let had_session = self.stop(parent).await;
            match self.sinks.remove(parent) {
                Some((_, sink)) => {
                    sink.reset();
                    true
                }
                None => had_session,
            }
        };
        drop(lock);
        self.parent_locks
            .remove_if(parent, |_, lock| Arc::strong_count(lock) == 1);

        if released {
            info!(parent = %parent, "Released parent region");
        }
        released
    }

    /// Returns true if a session for `parent` has not reached a terminal state.
    pub fn is_loading(&self, parent: &str) -> bool {
        self.active
            .get(parent)
            .map(|active| active.is_running())
            .unwrap_or(false)
    }

    /// Number of parents with a running session.
    pub fn active_count(&self) -> usize {
        self.active.iter().filter(|active| active.is_running()).count()
    }

    /// Current merged features for `parent`, if loaded and not released.
    pub fn features(&self, parent: &str) -> Option<FeatureSet> {
        self.sinks.get(parent).map(|sink| sink.snapshot())
    }

    /// Merge sink for `parent`, created on first use.
    pub fn sink(&self, parent: &str) -> Arc<MergeSink> {
        self.sinks
            .entry(parent.to_string())
            .or_insert_with(|| Arc::new(MergeSink::new(parent, Arc::clone(&self.renderer))))
            .clone()
    }

    fn parent_lock(&self, parent: &str) -> Arc<Mutex<()>> {
        self.parent_locks
            .entry(parent.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Cancel and await the session of `parent`, forgetting it.
    ///
    /// Returns true if a session was tracked. Callers hold the parent lock.
    async fn stop(&self, parent: &str) -> bool {
        let Some((_, previous)) = self.active.remove(parent) else {
            return false;
        };
        if previous.is_running() {
            info!(parent = %parent, "Stopping active load session");
            previous.cancel.cancel();
            let state = wait_terminal(previous.state_rx).await;
            debug!(parent = %parent, state = %state, "Previous session finished");
        }
        true
    }

    /// Forget sessions that reached a terminal state.
    fn prune_finished(&self) {
        self.active.retain(|_, active| active.is_running());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCacheProvider, RegionCacheClient};
    use crate::feature::SourceFeature;
    use crate::region::{RegionKey, StaticResolver};
    use crate::source::{BoxFuture, Page, RemoteSource, SourceError};
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Serves `pages` single-feature pages per key, tagged with the key.
    /// Keys starting with "stall" never answer.
    struct PagedSource {
        pages: usize,
        stalled: Notify,
    }

    impl PagedSource {
        fn new(pages: usize) -> Self {
            Self {
                pages,
                stalled: Notify::new(),
            }
        }
    }

    impl RemoteSource for PagedSource {
        fn fetch_page<'a>(
            &'a self,
            key: &'a RegionKey,
            cursor: Option<&'a str>,
        ) -> BoxFuture<'a, Result<Page, SourceError>> {
            if key.as_str().starts_with("stall") {
                self.stalled.notify_one();
                return Box::pin(futures::future::pending());
            }
            let index: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
            let mut properties = serde_json::Map::new();
            properties.insert("key".to_string(), json!(key.as_str()));
            let features = vec![SourceFeature::new(json!(null), properties)];
            let page = if index + 1 < self.pages {
                Page::with_continuation(features, (index + 1).to_string())
            } else {
                Page::last(features)
            };
            Box::pin(async move { Ok(page) })
        }
    }

    /// Records every replacement per parent.
    #[derive(Default)]
    struct RecordingRenderer {
        renders: parking_lot::Mutex<HashMap<String, Vec<FeatureSet>>>,
    }

    impl RecordingRenderer {
        fn sizes(&self, parent: &str) -> Vec<usize> {
            self.renders
                .lock()
                .get(parent)
                .map(|sets| sets.iter().map(FeatureSet::len).collect())
                .unwrap_or_default()
        }

        fn last(&self, parent: &str) -> Option<FeatureSet> {
            self.renders.lock().get(parent).and_then(|sets| sets.last().cloned())
        }
    }

    impl RenderSink for RecordingRenderer {
        fn replace(&self, parent: &str, features: FeatureSet) {
            self.renders
                .lock()
                .entry(parent.to_string())
                .or_default()
                .push(features);
        }
    }

    fn context(source: Arc<PagedSource>) -> LoadContext {
        let resolver = StaticResolver::new()
            .with_parent("A", ["1", "2"])
            .with_parent("B", ["3"])
            .with_parent("S", ["stall-1"]);
        let cache = RegionCacheClient::new(
            Arc::new(MemoryCacheProvider::new(1_000_000, None)),
            "test",
        );
        LoadContext::new(Arc::new(resolver), source, cache)
    }

    fn loader() -> RegionLoader {
        RegionLoader::detached(context(Arc::new(PagedSource::new(1))))
    }

    fn keys_of(features: &FeatureSet) -> Vec<String> {
        features
            .iter()
            .filter_map(|f| f.properties.get("key").and_then(|k| k.as_str()).map(str::to_string))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_load_fills_parent_sink() {
        let loader = loader();
        let report = loader.start_load("A").await.join().await.unwrap();

        assert!(report.is_completed());
        assert_eq!(loader.features("A").unwrap().len(), 2);
        assert!(loader.features("B").is_none());
        assert!(!loader.is_loading("A"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_parents_use_separate_sinks() {
        let loader = loader();
        let a = loader.start_load("A").await;
        let b = loader.start_load("B").await;

        a.join().await.unwrap();
        b.join().await.unwrap();

        assert_eq!(loader.features("A").unwrap().len(), 2);
        assert_eq!(loader.features("B").unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_parents_render_independently() {
        let renderer = Arc::new(RecordingRenderer::default());
        let loader = RegionLoader::new(context(Arc::new(PagedSource::new(3))), renderer.clone());

        let a = loader.start_load("A").await;
        let b = loader.start_load("B").await;
        let report_a = a.join().await.unwrap();
        let report_b = b.join().await.unwrap();

        // A finishes after B; B's collection must survive A's renders.
        assert_eq!(renderer.sizes("A"), vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(renderer.sizes("B"), vec![0, 1, 2, 3]);
        assert_eq!(renderer.last("A").unwrap(), report_a.features);
        assert_eq!(renderer.last("B").unwrap(), report_b.features);
        assert!(keys_of(&report_b.features).iter().all(|k| k == "3"));
        assert!(keys_of(&report_a.features).iter().all(|k| k != "3"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_drops_parent_state() {
        let renderer = Arc::new(RecordingRenderer::default());
        let loader = RegionLoader::new(context(Arc::new(PagedSource::new(1))), renderer.clone());
        loader.start_load("A").await.join().await.unwrap();
        loader.start_load("B").await.join().await.unwrap();

        assert!(loader.release("A").await);

        assert!(loader.features("A").is_none());
        assert_eq!(loader.features("B").unwrap().len(), 1);
        assert!(renderer.last("A").unwrap().is_empty());
        assert!(loader.sinks.get("A").is_none());
        assert!(loader.active.get("A").is_none());
        assert!(loader.parent_locks.get("A").is_none());
        assert!(!loader.release("A").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_cancels_running_session() {
        let loader = loader();
        let handle = loader.start_load("A").await;

        assert!(loader.release("A").await);

        let report = handle.join().await.unwrap();
        assert_eq!(report.state, SessionState::Cancelled);
        assert!(loader.features("A").is_none());
        assert!(!loader.is_loading("A"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_sessions_are_pruned() {
        let loader = loader();
        loader.start_load("A").await.join().await.unwrap();
        loader.start_load("B").await.join().await.unwrap();

        assert_eq!(loader.active.len(), 1);
        assert!(loader.active.get("B").is_some());
        assert_eq!(loader.active_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_supersede_wait_does_not_block_other_parents() {
        let source = Arc::new(PagedSource::new(1));
        let loader = Arc::new(RegionLoader::detached(context(source.clone())));

        let _stalled = loader.start_load("S").await;
        source.stalled.notified().await;

        // The stalled fetch never finishes, so this supersede never returns.
        let superseding = Arc::clone(&loader);
        tokio::spawn(async move { superseding.start_load("S").await });
        tokio::task::yield_now().await;

        let b = tokio::time::timeout(Duration::from_secs(5), loader.start_load("B"))
            .await
            .expect("start_load for another parent was blocked");
        assert!(b.join().await.unwrap().is_completed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_unknown_parent() {
        let loader = loader();
        assert!(!loader.cancel("missing"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_callbacks_registered_on_loader() {
        let loader = loader();
        let count = Arc::new(parking_lot::Mutex::new(0usize));
        let seen = Arc::clone(&count);
        loader.on_progress(move |_| *seen.lock() += 1);

        loader.start_load("B").await.join().await.unwrap();
        assert!(*count.lock() > 0);
    }
}
