//! Key resolver backed by an HTTP endpoint.

use serde::Deserialize;

use super::{RegionKey, RegionKeyResolver, ResolveError};
use crate::source::{is_json_content_type, BoxFuture, HttpClient};

/// Accepted response shapes: a bare array or an object with a `keys` member.
#[derive(Deserialize)]
#[serde(untagged)]
enum KeyList {
    Bare(Vec<String>),
    Wrapped { keys: Vec<String> },
}

/// Resolves child keys with `GET {base_url}/{parent}`.
pub struct HttpKeyResolver<C: HttpClient> {
    http_client: C,
    base_url: String,
}

impl<C: HttpClient> HttpKeyResolver<C> {
    /// Create a resolver for the given endpoint root.
    pub fn new(http_client: C, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
        }
    }

    fn build_url(&self, parent: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), parent)
    }
}

impl<C: HttpClient> RegionKeyResolver for HttpKeyResolver<C> {
    fn resolve<'a>(&'a self, parent: &'a str) -> BoxFuture<'a, Result<Vec<RegionKey>, ResolveError>> {
        Box::pin(async move {
            let url = self.build_url(parent);
            let response = self
                .http_client
                .get(&url)
                .await
                .map_err(|e| ResolveError::Unavailable(e.to_string()))?;

            if response.status == 404 {
                return Err(ResolveError::UnknownParent(parent.to_string()));
            }
            if !response.is_success() {
                return Err(ResolveError::Unavailable(format!(
                    "HTTP {} from {}",
                    response.status, url
                )));
            }
            if !response
                .content_type
                .as_deref()
                .is_some_and(is_json_content_type)
            {
                return Err(ResolveError::InvalidResponse(format!(
                    "non-JSON response from {}",
                    url
                )));
            }

            let list: KeyList = serde_json::from_slice(&response.body)
                .map_err(|e| ResolveError::InvalidResponse(e.to_string()))?;
            let keys = match list {
                KeyList::Bare(keys) | KeyList::Wrapped { keys } => keys,
            };

            Ok(keys.into_iter().map(RegionKey::from).collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{HttpResponse, MockHttpClient, SourceError};

    const URL: &str = "https://data.example.org/regions";

    fn resolver() -> HttpKeyResolver<MockHttpClient> {
        HttpKeyResolver::new(MockHttpClient::new(), URL)
    }

    #[tokio::test]
    async fn test_bare_array() {
        let resolver = resolver();
        resolver
            .http_client
            .respond(&format!("{}/0363", URL), Ok(HttpResponse::json(r#"["1011","1012"]"#)));

        let keys = resolver.resolve("0363").await.unwrap();
        assert_eq!(keys, vec![RegionKey::from("1011"), RegionKey::from("1012")]);
    }

    #[tokio::test]
    async fn test_wrapped_object() {
        let resolver = resolver();
        resolver
            .http_client
            .respond(&format!("{}/0363", URL), Ok(HttpResponse::json(r#"{"keys":["1011"]}"#)));

        let keys = resolver.resolve("0363").await.unwrap();
        assert_eq!(keys.len(), 1);
    }

    #[tokio::test]
    async fn test_not_found_is_unknown_parent() {
        let resolver = resolver();
        let mut response = HttpResponse::json("[]");
        response.status = 404;
        resolver.http_client.respond(&format!("{}/0000", URL), Ok(response));

        let err = resolver.resolve("0000").await.unwrap_err();
        assert!(matches!(err, ResolveError::UnknownParent(_)));
    }

    #[tokio::test]
    async fn test_transport_failure_is_unavailable() {
        let resolver = resolver();
        resolver.http_client.respond(
            &format!("{}/0363", URL),
            Err(SourceError::Network("connection refused".into())),
        );

        let err = resolver.resolve("0363").await.unwrap_err();
        assert!(matches!(err, ResolveError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_garbage_is_invalid_response() {
        let resolver = resolver();
        resolver
            .http_client
            .respond(&format!("{}/0363", URL), Ok(HttpResponse::json("{\"nope\":1}")));

        let err = resolver.resolve("0363").await.unwrap_err();
        assert!(matches!(err, ResolveError::InvalidResponse(_)));
    }
}
