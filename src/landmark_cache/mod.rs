//! Landmark cache store
//!
//! Persists landmark records per region key under `landmarks/{key}.json`,
//! resolving remote image URLs through the [`ImageStore`](crate::image_store::ImageStore)
//! at write time. Entries are replaced wholesale on every `put`, judged for
//! freshness lazily on read and only ever removed by an explicit `sweep`.

pub mod entry;
pub mod store;

pub use entry::{CacheEntry, CacheLookup};
pub use store::{CacheDiskStats, LandmarkCacheStore, SweepReport};
