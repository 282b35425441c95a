//! regionload - incremental, cache-aware loading of region-partitioned
//! feature collections.
//!
//! A parent region is resolved into child keys. Each key is served from a
//! persistent cache when fresh, or fetched page by page from a remote source.
//! Features are merged progressively into a [`merge::MergeSink`] that a
//! renderer observes, and the completed merge is written back to a shared
//! server cache on a best-effort basis.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use regionload::cache::{DiskCacheProvider, RegionCacheClient};
//! use regionload::loader::RegionLoader;
//! use regionload::region::{HttpKeyResolver, Partition};
//! use regionload::session::LoadContext;
//! use regionload::source::{HttpPageSource, ReqwestClient};
//!
//! let partition = Partition::new("postcode4", 500);
//! let source = HttpPageSource::new(ReqwestClient::new()?, base_url, partition.clone());
//! let resolver = HttpKeyResolver::new(ReqwestClient::new()?, resolver_url);
//! let cache = RegionCacheClient::new(Arc::new(DiskCacheProvider::new(dir)), &partition.name);
//!
//! let loader = RegionLoader::detached(LoadContext::new(
//!     Arc::new(resolver),
//!     Arc::new(source),
//!     cache,
//! ));
//! loader.on_progress(|event| println!("{}", event.message));
//! let report = loader.start_load("0363").await.join().await?;
//! ```

pub mod cache;
pub mod config;
pub mod feature;
pub mod loader;
pub mod logging;
pub mod merge;
pub mod region;
pub mod session;
pub mod source;
pub mod writeback;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
