//! Persistent client-side cache.
//!
//! Layered the same way for every backend:
//!
//! - [`Cache`]: generic async byte store keyed by strings
//! - providers: [`MemoryCacheProvider`] (moka) and [`DiskCacheProvider`] (files)
//! - [`RegionCacheClient`]: per-partition client storing timestamped
//!   [`CacheEntry`] values, failing soft on every storage error

mod clients;
mod entry;
mod providers;
mod traits;

pub use clients::RegionCacheClient;
pub use entry::{CacheEntry, DEFAULT_CACHE_TTL};
pub use providers::{
    clear_disk_cache, disk_cache_stats, ClearResult, DiskCacheProvider, MemoryCacheProvider,
};
pub use traits::{Cache, ServiceCacheError};
