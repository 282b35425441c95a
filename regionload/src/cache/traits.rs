//! Core traits for the generic cache service.
//!
//! The `Cache` trait provides a domain-agnostic key-value interface for caching.
//! All cache providers implement this trait, allowing callers to use any backend
//! through a consistent interface.
//!
//! # Design Principles
//!
//! - **String keys**: Human-readable for debugging, flexible for any domain
//! - **Vec<u8> values**: Raw bytes, no serialization opinions imposed
//! - **Minimal interface**: Only essential operations, no domain-specific concerns
//! - **Dyn-compatible**: Uses `Pin<Box<dyn Future>>` for trait object support
//!
//! # Example
//!
//! ```ignore
//! use regionload::cache::{Cache, MemoryCacheProvider};
//!
//! let cache = MemoryCacheProvider::new(64 * 1024 * 1024, None);
//! cache.set("postcode4:1011", vec![1, 2, 3]).await?;
//! let value = cache.get("postcode4:1011").await?;
//! ```

use thiserror::Error;

pub use crate::source::BoxFuture;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum ServiceCacheError {
    /// I/O error during cache operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Value exceeds maximum allowed size.
    #[error("Value too large: {size} bytes (max: {max})")]
    ValueTooLarge { size: usize, max: usize },

    /// Provider-specific error.
    #[error("Provider error: {0}")]
    Provider(String),
}

/// Generic cache interface for key-value storage.
///
/// Providers implement this trait to offer caching capabilities. The interface
/// is intentionally minimal and domain-agnostic - region keys and entry
/// timestamps are handled by the [`RegionCacheClient`](super::RegionCacheClient)
/// decorator.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` for use across async tasks.
/// Concurrent operations on distinct keys never conflict.
pub trait Cache: Send + Sync {
    /// Store a value with the given key, replacing any previous value.
    fn set(&self, key: &str, value: Vec<u8>) -> BoxFuture<'_, Result<(), ServiceCacheError>>;

    /// Retrieve a value by key.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(data))` if the key exists
    /// - `Ok(None)` if the key is not found
    /// - `Err(_)` if an error occurs
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, ServiceCacheError>>;

    /// Delete a value by key.
    ///
    /// Returns `Ok(true)` if the key existed and was deleted.
    fn delete(&self, key: &str) -> BoxFuture<'_, Result<bool, ServiceCacheError>>;

    /// Check if a key exists without retrieving the value.
    fn contains(&self, key: &str) -> BoxFuture<'_, Result<bool, ServiceCacheError>>;

    /// Get the current number of entries in the cache.
    fn entry_count(&self) -> u64;
}
