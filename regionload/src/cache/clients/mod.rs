//! Domain-specific cache clients.
//!
//! These clients wrap the generic `Cache` trait with domain-specific
//! key translation and value encoding.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  RegionCacheClient           │
//! │                              │
//! │ (partition, key) → cache key │
//! │ CacheEntry ⇄ JSON            │
//! │ failures → miss / warning    │
//! └──────────────┬───────────────┘
//!                │
//!                ▼
//! ┌──────────────────────────────┐
//! │        Arc<dyn Cache>        │
//! │  string → Vec<u8> store      │
//! └──────────────────────────────┘
//! ```
//!
//! # Key Format
//!
//! `"{partition}:{key}"`, e.g. `"postcode4:1011"`.

mod region;

pub use region::RegionCacheClient;
