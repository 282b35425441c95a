//! Progress reporting for load sessions.

use std::sync::Arc;

use parking_lot::RwLock;

/// A progress update.
///
/// `loaded_count` counts keys that finished (fetched, served from cache or
/// failed) and never decreases within a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Parent region of the emitting session.
    pub parent: String,
    /// Human-readable status; empty when the message is cleared.
    pub message: String,
    /// Keys finished so far.
    pub loaded_count: usize,
    /// Keys in the session.
    pub total_count: usize,
}

impl ProgressEvent {
    /// Create an event.
    pub fn new(
        parent: impl Into<String>,
        message: impl Into<String>,
        loaded_count: usize,
        total_count: usize,
    ) -> Self {
        Self {
            parent: parent.into(),
            message: message.into(),
            loaded_count,
            total_count,
        }
    }

    /// Create an event that clears any displayed message.
    pub fn cleared(parent: impl Into<String>, loaded_count: usize, total_count: usize) -> Self {
        Self::new(parent, String::new(), loaded_count, total_count)
    }

    /// Returns true if the event clears the message.
    pub fn is_cleared(&self) -> bool {
        self.message.is_empty()
    }
}

/// Progress callback.
pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Fan-out of progress events to registered callbacks.
///
/// Cloning shares the subscriber list.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    subscribers: Arc<RwLock<Vec<ProgressCallback>>>,
}

impl ProgressReporter {
    /// Create a reporter without subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for every subsequent event.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&ProgressEvent) + Send + Sync + 'static,
    {
        self.subscribers.write().push(Arc::new(callback));
    }

    /// Deliver an event to all subscribers.
    pub fn emit(&self, event: &ProgressEvent) {
        tracing::trace!(
            parent = %event.parent,
            loaded = event.loaded_count,
            total = event.total_count,
            message = %event.message,
            "Progress"
        );
        // Callbacks may subscribe further listeners; don't hold the lock.
        let subscribers: Vec<ProgressCallback> = self.subscribers.read().clone();
        for callback in subscribers {
            callback(event);
        }
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}
