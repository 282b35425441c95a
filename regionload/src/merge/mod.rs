//! Append-only feature accumulator.
//!
//! The [`MergeSink`] assigns session-local ids and hands a growing snapshot
//! of the merged collection to the renderer after every append, so partial
//! loads become visible while the session is still running.
//!
//! Snapshots are [`FeatureSet`]s: an append adds one shared chunk, so
//! publishing a snapshot never copies the features merged before it.
//!
//! # Concurrency
//!
//! Id assignment and the append itself happen under one lock: concurrent
//! appends never share an id and never interleave within a page. Renderer
//! notifications are serialized too, so the renderer only ever sees
//! snapshots that grow.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::feature::{Feature, FeatureSet, SourceFeature};

/// Consumer of merged features (map layer, file writer, ...).
///
/// Receives a full replacement of one parent's collection after each append.
/// Collections of different parents never replace each other. Thread and
/// re-entrancy safety are the sink's responsibility; it must not call back
/// into [`MergeSink::append`] or [`MergeSink::reset`].
pub trait RenderSink: Send + Sync {
    /// Replace the rendered collection of `parent`.
    fn replace(&self, parent: &str, features: FeatureSet);
}

/// Render sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRenderSink;

impl RenderSink for NullRenderSink {
    fn replace(&self, _parent: &str, _features: FeatureSet) {}
}

/// Outcome of one append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Id given to the first appended feature (next id if nothing appended).
    pub first_id: u64,
    /// Number of features appended.
    pub appended: usize,
    /// Collection size after the append.
    pub total: usize,
}

struct SinkState {
    features: FeatureSet,
    next_id: u64,
}

/// Append-only feature accumulator for one parent region.
pub struct MergeSink {
    parent: String,
    state: Mutex<SinkState>,
    /// Held across state update and notification to keep renders ordered.
    render_order: Mutex<()>,
    renderer: Arc<dyn RenderSink>,
    snapshots: watch::Sender<FeatureSet>,
}

impl MergeSink {
    /// Create an empty sink feeding `renderer` with `parent`'s collection.
    pub fn new(parent: impl Into<String>, renderer: Arc<dyn RenderSink>) -> Self {
        let (snapshots, _) = watch::channel(FeatureSet::new());
        Self {
            parent: parent.into(),
            state: Mutex::new(SinkState {
                features: FeatureSet::new(),
                next_id: 0,
            }),
            render_order: Mutex::new(()),
            renderer,
            snapshots,
        }
    }

    /// Create an empty sink without a renderer.
    pub fn detached(parent: impl Into<String>) -> Self {
        Self::new(parent, Arc::new(NullRenderSink))
    }

    /// Parent region whose collection this sink holds.
    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// Assign ids to `features`, append them and publish the new snapshot.
    pub fn append(&self, features: Vec<SourceFeature>) -> AppendOutcome {
        let _order = self.render_order.lock();

        let (outcome, snapshot) = {
            let mut state = self.state.lock();
            let first_id = state.next_id;
            let appended = features.len();

            let merged: Vec<Feature> = features
                .into_iter()
                .enumerate()
                .map(|(offset, feature)| feature.with_id(first_id + offset as u64))
                .collect();
            state.features.extend(merged);
            state.next_id += appended as u64;

            let outcome = AppendOutcome {
                first_id,
                appended,
                total: state.features.len(),
            };
            (outcome, state.features.clone())
        };

        self.publish(snapshot);
        outcome
    }

    /// Clear the collection and restart ids at 0.
    pub fn reset(&self) {
        let _order = self.render_order.lock();
        {
            let mut state = self.state.lock();
            state.features = FeatureSet::new();
            state.next_id = 0;
        }
        self.publish(FeatureSet::new());
    }

    /// Current collection.
    pub fn snapshot(&self) -> FeatureSet {
        self.state.lock().features.clone()
    }

    /// Number of merged features.
    pub fn len(&self) -> usize {
        self.state.lock().features.len()
    }

    /// Returns true if nothing has been merged.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscribe to snapshots; the receiver always holds the latest one.
    pub fn subscribe(&self) -> watch::Receiver<FeatureSet> {
        self.snapshots.subscribe()
    }

    fn publish(&self, snapshot: FeatureSet) {
        self.snapshots.send_replace(snapshot.clone());
        self.renderer.replace(&self.parent, snapshot);
    }
}
