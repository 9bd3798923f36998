//! Offline-capable landmark cache.
//!
//! Landmark lookups are keyed by a rounded region key, persisted as JSON files
//! under a cache root and served from disk while fresh. Landmark photos are
//! downloaded once into a content-addressed image directory so cached entries
//! keep working without network access.

pub mod config;
pub mod errors;
pub mod image_store;
pub mod landmark_cache;
pub mod models;
pub mod observability;
pub mod region_key;
pub mod services;
pub mod sources;
pub mod utils;

pub use config::Config;
pub use errors::{LandmarkError, LandmarkResult};
pub use image_store::{HttpImageDownloader, ImageDownloader, ImageStore};
pub use landmark_cache::{CacheEntry, CacheLookup, LandmarkCacheStore, SweepReport};
pub use models::{Coordinates, DataSource, LandmarkRecord, Qualifiers, RegionQuery};
pub use region_key::RegionKey;
pub use services::{CacheStats, LandmarkService};
pub use sources::{build_source, LandmarkSource};
