//! Service layer
//!
//! The orchestration between the landmark cache and the data source adapter.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use landmark_explorer::{Config, LandmarkService, RegionQuery};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load()?;
//!     let service = LandmarkService::from_config(&config)?;
//!
//!     let query = RegionQuery::radius(37.7749, -122.4194, 5.0)?;
//!     let qualifiers = service.qualifiers("en")?;
//!     let landmarks = service
//!         .get_or_fetch(&query, &qualifiers, Duration::from_secs(24 * 3600))
//!         .await?;
//!     println!("{} landmarks", landmarks.len());
//!     Ok(())
//! }
//! ```

pub mod cache_stats;
pub mod landmark_service;

pub use cache_stats::{CacheStats, CacheStatsSnapshot};
pub use landmark_service::LandmarkService;
