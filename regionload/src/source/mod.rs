//! Remote paginated feature sources.
//!
//! A [`RemoteSource`] returns one bounded page of features per call together
//! with an optional continuation cursor. [`HttpPageSource`] talks to a REST
//! endpoint through the [`HttpClient`] abstraction; [`Paginator`] keeps the
//! cursor state for one key's fetch loop.
//!
//! ```ignore
//! use regionload::region::{Partition, RegionKey};
//! use regionload::source::{HttpPageSource, Paginator, ReqwestClient};
//!
//! let source = HttpPageSource::new(
//!     ReqwestClient::new()?,
//!     "https://data.example.org/api",
//!     Partition::new("postcode4", 500),
//! );
//! let mut pages = Paginator::new(RegionKey::from("1011"));
//! while let Some(page) = pages.next_page(&source).await {
//!     println!("{} features", page?.len());
//! }
//! ```

mod http;
mod page;
mod paginator;
mod types;

pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use page::HttpPageSource;
pub(crate) use page::is_json_content_type;
pub use paginator::Paginator;
pub use types::{BoxFuture, Page, RemoteSource, SourceError};

#[cfg(test)]
pub use http::tests::MockHttpClient;
