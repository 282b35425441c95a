//! Cursor bookkeeping for one key's pagination loop.

use std::collections::HashSet;

use super::types::{Page, RemoteSource, SourceError};
use crate::feature::SourceFeature;
use crate::region::RegionKey;

/// Drives `RemoteSource::fetch_page` for a single key.
///
/// Each call to [`next_page`](Self::next_page) fetches exactly one page using
/// the latest cursor, records the page's features and returns them. Once a
/// page without continuation arrives, the paginator is finished and refuses
/// to issue further requests. A failed page also finishes it; the key's
/// remaining pages are abandoned.
///
/// A continuation cursor that was already followed for this key is a
/// pagination cycle and fails the key with [`SourceError::Format`].
#[derive(Debug)]
pub struct Paginator {
    key: RegionKey,
    cursor: Option<String>,
    seen_cursors: HashSet<String>,
    finished: bool,
    pages_fetched: usize,
    accumulated: Vec<SourceFeature>,
}

impl Paginator {
    /// Start paginating `key` from its first page.
    pub fn new(key: RegionKey) -> Self {
        Self {
            key,
            cursor: None,
            seen_cursors: HashSet::new(),
            finished: false,
            pages_fetched: 0,
            accumulated: Vec::new(),
        }
    }

    /// Cursor the next request will use.
    pub fn next_cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// True once the terminal page was received or a page failed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of pages successfully fetched.
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Fetch the next page.
    ///
    /// Returns `None` without touching the source when already finished.
    /// Returns the page's features on success; they are also kept for
    /// [`into_features`](Self::into_features).
    pub async fn next_page<S>(&mut self, source: &S) -> Option<Result<Vec<SourceFeature>, SourceError>>
    where
        S: RemoteSource + ?Sized,
    {
        if self.finished {
            return None;
        }

        match source.fetch_page(&self.key, self.cursor.as_deref()).await {
            Ok(Page {
                features,
                continuation,
            }) => {
                if let Some(next) = &continuation {
                    if !self.seen_cursors.insert(next.clone()) {
                        self.finished = true;
                        return Some(Err(SourceError::Format(format!(
                            "cursor {:?} repeated for region {}",
                            next, self.key
                        ))));
                    }
                }
                self.pages_fetched += 1;
                self.finished = continuation.is_none();
                self.cursor = continuation;
                self.accumulated.extend(features.iter().cloned());
                Some(Ok(features))
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }

    /// All features received so far, in arrival order.
    pub fn into_features(self) -> Vec<SourceFeature> {
        self.accumulated
    }
}
