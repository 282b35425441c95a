//! Cache provider implementations.
//!
//! Each provider implements the `Cache` trait.
//!
//! # Available Providers
//!
//! - [`MemoryCacheProvider`]: In-memory LRU cache using moka
//! - [`DiskCacheProvider`]: One JSON file per key under a cache directory

mod disk;
mod memory;

pub use disk::{clear_disk_cache, disk_cache_stats, ClearResult, DiskCacheProvider};
pub use memory::MemoryCacheProvider;
