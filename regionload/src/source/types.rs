//! Core types shared by remote sources.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::feature::SourceFeature;
use crate::region::RegionKey;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors returned by a remote source.
///
/// Both variants are recovered per key by the load session: the key
/// contributes no further features and the session moves on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// Non-success status or connection failure.
    #[error("network error: {0}")]
    Network(String),

    /// Unexpected content type or payload shape.
    #[error("format error: {0}")]
    Format(String),
}

impl SourceError {
    /// Returns true for network-level failures.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Returns true for format failures.
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format(_))
    }
}

/// One page of features for a region key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Features in arrival order.
    pub features: Vec<SourceFeature>,

    /// Cursor for the next page; `None` marks the terminal page.
    pub continuation: Option<String>,
}

impl Page {
    /// Create a terminal page.
    pub fn last(features: Vec<SourceFeature>) -> Self {
        Self {
            features,
            continuation: None,
        }
    }

    /// Create a page followed by another one.
    pub fn with_continuation(features: Vec<SourceFeature>, cursor: impl Into<String>) -> Self {
        Self {
            features,
            continuation: Some(cursor.into()),
        }
    }

    /// Returns true if no further page exists for the key.
    pub fn is_last(&self) -> bool {
        self.continuation.is_none()
    }
}

/// Paginated feature source.
///
/// Implementations return one bounded page per call. Callers keep calling
/// with the latest continuation until a page without one comes back.
pub trait RemoteSource: Send + Sync {
    /// Fetch one page for `key`, starting from `cursor` (`None` = first page).
    fn fetch_page<'a>(
        &'a self,
        key: &'a RegionKey,
        cursor: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Page, SourceError>>;
}
