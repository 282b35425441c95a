//! Best-effort writeback of completed merges to a shared server cache.
//!
//! Writeback is fire-and-forget: the session spawns the submission, logs a
//! failure and never retries or reports it. The client-side cache stays
//! authoritative within its TTL window regardless of the outcome.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::feature::{FeatureCollection, FeatureSet};
use crate::source::{BoxFuture, HttpClient};

/// Writeback failure. Only ever logged.
#[derive(Debug, Error)]
pub enum WritebackError {
    /// The collection could not be serialized.
    #[error("failed to serialize collection: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The request failed or was rejected.
    #[error("writeback request failed: {0}")]
    Request(String),
}

/// Submits a full merged collection keyed by its parent region.
pub trait CacheWriteback: Send + Sync {
    /// Submit `features` as the merged collection of `parent`.
    fn submit<'a>(
        &'a self,
        parent: &'a str,
        features: FeatureSet,
    ) -> BoxFuture<'a, Result<(), WritebackError>>;
}

/// Writeback that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWriteback;

impl CacheWriteback for NoWriteback {
    fn submit<'a>(
        &'a self,
        _parent: &'a str,
        _features: FeatureSet,
    ) -> BoxFuture<'a, Result<(), WritebackError>> {
        Box::pin(async { Ok(()) })
    }
}

/// Posts the collection as GeoJSON to `{base_url}/{partition}/{parent}`.
pub struct HttpWriteback<C: HttpClient> {
    http_client: C,
    base_url: String,
    partition: String,
}

impl<C: HttpClient> HttpWriteback<C> {
    /// Create a writeback for one partition.
    pub fn new(http_client: C, base_url: impl Into<String>, partition: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
            partition: partition.into(),
        }
    }

    fn build_url(&self, parent: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.partition,
            parent
        )
    }
}

impl<C: HttpClient> CacheWriteback for HttpWriteback<C> {
    fn submit<'a>(
        &'a self,
        parent: &'a str,
        features: FeatureSet,
    ) -> BoxFuture<'a, Result<(), WritebackError>> {
        Box::pin(async move {
            let body = FeatureCollection::new(&features).to_json_vec()?;
            let url = self.build_url(parent);
            let response = self
                .http_client
                .post_json(&url, body)
                .await
                .map_err(|e| WritebackError::Request(e.to_string()))?;
            if !response.is_success() {
                return Err(WritebackError::Request(format!(
                    "HTTP {} from {}",
                    response.status, url
                )));
            }
            Ok(())
        })
    }
}

/// Spawn a writeback onto the current runtime and forget about it.
pub fn spawn_writeback(
    writeback: Arc<dyn CacheWriteback>,
    parent: String,
    features: FeatureSet,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let count = features.len();
        match writeback.submit(&parent, features).await {
            Ok(()) => debug!(parent = %parent, features = count, "Writeback submitted"),
            Err(e) => warn!(parent = %parent, error = %e, "Writeback failed"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::SourceFeature;
    use crate::source::{HttpResponse, MockHttpClient, SourceError};
    use serde_json::{json, Value};

    const URL: &str = "https://data.example.org/cache";

    fn collection(n: usize) -> FeatureSet {
        (0..n)
            .map(|i| SourceFeature::new(json!(null), Default::default()).with_id(i as u64))
            .collect()
    }

    #[tokio::test]
    async fn test_http_writeback_posts_geojson() {
        let client = MockHttpClient::new();
        client.respond(&format!("{}/postcode4/0363", URL), Ok(HttpResponse::json("{}")));
        let writeback = HttpWriteback::new(client, URL, "postcode4");

        writeback.submit("0363", collection(3)).await.unwrap();

        let posts = writeback.http_client.posts.lock();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, format!("{}/postcode4/0363", URL));
        let body: Value = serde_json::from_slice(&posts[0].1).unwrap();
        assert_eq!(body["type"], "FeatureCollection");
        assert_eq!(body["features"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_http_writeback_rejected() {
        let client = MockHttpClient::new();
        let mut response = HttpResponse::json("");
        response.status = 500;
        client.respond(&format!("{}/postcode4/0363", URL), Ok(response));
        let writeback = HttpWriteback::new(client, URL, "postcode4");

        let err = writeback.submit("0363", collection(1)).await.unwrap_err();
        assert!(matches!(err, WritebackError::Request(_)));
    }

    #[tokio::test]
    async fn test_spawned_failure_is_swallowed() {
        let client = MockHttpClient::new();
        client.respond(
            &format!("{}/postcode4/0363", URL),
            Err(SourceError::Network("refused".into())),
        );
        let writeback: Arc<dyn CacheWriteback> =
            Arc::new(HttpWriteback::new(client, URL, "postcode4"));

        let handle = spawn_writeback(writeback, "0363".to_string(), collection(1));
        assert!(handle.await.is_ok());
    }

    #[tokio::test]
    async fn test_no_writeback() {
        assert!(NoWriteback.submit("0363", collection(2)).await.is_ok());
    }
}
