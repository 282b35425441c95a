//! HTTP page source.
//!
//! Fetches feature pages from a REST endpoint of the form
//!
//! ```text
//! GET {base_url}/{partition}/{key}?pageSize={n}[&cursor={cursor}]
//! ```
//!
//! The body is either a plain page object or a GeoJSON `FeatureCollection`
//! extended with a `nextCursor` member:
//!
//! ```text
//! {"type": "FeatureCollection", "features": [...], "nextCursor": "abc"}
//! ```
//!
//! A missing, `null` or empty `nextCursor` marks the last page.

use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use super::http::{HttpClient, HttpResponse};
use super::types::{BoxFuture, Page, RemoteSource, SourceError};
use crate::feature::SourceFeature;
use crate::region::{Partition, RegionKey};

/// Wire shape of one page.
#[derive(Debug, Deserialize)]
struct PageBody {
    features: Vec<SourceFeature>,
    #[serde(default, rename = "nextCursor", alias = "next_cursor")]
    next_cursor: Option<Value>,
}

/// Remote source backed by a paginated HTTP endpoint.
pub struct HttpPageSource<C: HttpClient> {
    http_client: C,
    base_url: String,
    partition: Partition,
}

impl<C: HttpClient> HttpPageSource<C> {
    /// Creates a page source for one partition.
    ///
    /// # Arguments
    ///
    /// * `http_client` - HTTP client for making requests
    /// * `base_url` - Endpoint root, without the partition segment
    /// * `partition` - Partition name and page size
    pub fn new(http_client: C, base_url: impl Into<String>, partition: Partition) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
            partition,
        }
    }

    /// The partition this source serves.
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Builds the page URL for a key and cursor.
    fn build_url(&self, key: &RegionKey, cursor: Option<&str>) -> Result<String, SourceError> {
        let raw = format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.partition.name,
            key
        );
        let mut url = Url::parse(&raw)
            .map_err(|e| SourceError::Network(format!("invalid page url {}: {}", raw, e)))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("pageSize", &self.partition.page_size.to_string());
            if let Some(cursor) = cursor {
                query.append_pair("cursor", cursor);
            }
        }
        Ok(url.into())
    }
}

impl<C: HttpClient> RemoteSource for HttpPageSource<C> {
    fn fetch_page<'a>(
        &'a self,
        key: &'a RegionKey,
        cursor: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Page, SourceError>> {
        Box::pin(async move {
            let url = self.build_url(key, cursor)?;
            let response = self.http_client.get(&url).await?;
            parse_page(&url, response)
        })
    }
}

/// Returns true for JSON-family media types (`application/json`,
/// `application/geo+json`, any `+json` suffix).
pub(crate) fn is_json_content_type(content_type: &str) -> bool {
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    media_type == "application/json" || media_type.ends_with("+json")
}

/// Validates a response and decodes it into a page.
pub(crate) fn parse_page(url: &str, response: HttpResponse) -> Result<Page, SourceError> {
    if !response.is_success() {
        return Err(SourceError::Network(format!(
            "HTTP {} from {}",
            response.status, url
        )));
    }

    match response.content_type.as_deref() {
        Some(ct) if is_json_content_type(ct) => {}
        Some(ct) => {
            return Err(SourceError::Format(format!(
                "unexpected content type '{}' from {}",
                ct, url
            )))
        }
        None => {
            return Err(SourceError::Format(format!(
                "missing content type from {}",
                url
            )))
        }
    }

    let body: PageBody = serde_json::from_slice(&response.body)
        .map_err(|e| SourceError::Format(format!("invalid page from {}: {}", url, e)))?;

    let continuation = match body.next_cursor {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(other) => {
            return Err(SourceError::Format(format!(
                "unexpected cursor {} from {}",
                other, url
            )))
        }
    };

    Ok(Page {
        features: body.features,
        continuation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::http::tests::MockHttpClient;
    use serde_json::json;

    const BASE: &str = "https://data.example.org/api";

    fn source() -> HttpPageSource<MockHttpClient> {
        HttpPageSource::new(MockHttpClient::new(), BASE, Partition::new("postcode4", 2))
    }

    fn body(value: Value) -> HttpResponse {
        HttpResponse::json(serde_json::to_vec(&value).unwrap())
    }

    #[test]
    fn test_url_first_page() {
        let url = source().build_url(&RegionKey::from("1011"), None).unwrap();
        assert_eq!(url, format!("{}/postcode4/1011?pageSize=2", BASE));
    }

    #[test]
    fn test_url_encodes_cursor() {
        let url = source()
            .build_url(&RegionKey::from("1011"), Some("a b&c"))
            .unwrap();
        assert_eq!(
            url,
            format!("{}/postcode4/1011?pageSize=2&cursor=a+b%26c", BASE)
        );
    }

    #[test]
    fn test_json_content_types() {
        assert!(is_json_content_type("application/json"));
        assert!(is_json_content_type("application/json; charset=utf-8"));
        assert!(is_json_content_type("application/geo+json"));
        assert!(!is_json_content_type("text/html"));
    }

    #[tokio::test]
    async fn test_fetch_page_with_cursor() {
        let source = source();
        let url = format!("{}/postcode4/1011?pageSize=2", BASE);
        source.http_client.respond(
            &url,
            Ok(body(json!({
                "type": "FeatureCollection",
                "features": [
                    {"type": "Feature", "geometry": null, "properties": {"a": 1}},
                    {"type": "Feature", "geometry": null, "properties": {"a": 2}}
                ],
                "nextCursor": "p2"
            }))),
        );

        let page = source
            .fetch_page(&RegionKey::from("1011"), None)
            .await
            .unwrap();
        assert_eq!(page.features.len(), 2);
        assert_eq!(page.continuation.as_deref(), Some("p2"));
    }

    #[test]
    fn test_terminal_page_variants() {
        for cursor in [json!(null), json!("")] {
            let page = parse_page("u", body(json!({"features": [], "nextCursor": cursor}))).unwrap();
            assert!(page.is_last());
        }
        let page = parse_page("u", body(json!({"features": []}))).unwrap();
        assert!(page.is_last());
    }

    #[test]
    fn test_numeric_cursor() {
        let page = parse_page("u", body(json!({"features": [], "nextCursor": 500}))).unwrap();
        assert_eq!(page.continuation.as_deref(), Some("500"));
    }

    #[test]
    fn test_non_ok_status_is_network_error() {
        let mut response = body(json!({"features": []}));
        response.status = 503;
        assert!(parse_page("u", response).unwrap_err().is_network());
    }

    #[test]
    fn test_html_is_format_error() {
        let response = HttpResponse {
            status: 200,
            content_type: Some("text/html".to_string()),
            body: b"<html></html>".to_vec(),
        };
        assert!(parse_page("u", response).unwrap_err().is_format());
    }

    #[test]
    fn test_missing_features_is_format_error() {
        let err = parse_page("u", body(json!({"items": []}))).unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn test_object_cursor_is_format_error() {
        let err = parse_page("u", body(json!({"features": [], "nextCursor": {}}))).unwrap_err();
        assert!(err.is_format());
    }
}
