//! Centralized error handling for the landmark explorer
//!
//! Every layer has its own error enum so callers can tell environmental
//! failures apart from caller bugs:
//!
//! - **Query Errors**: contract violations when building a region query (fail fast)
//! - **Record Errors**: a single landmark failed validation (dropped, batch continues)
//! - **Download Errors**: image fetches (absorbed by the image store)
//! - **Cache Errors**: persistent store I/O and serialization
//! - **Source Errors**: data source adapters (network, quota, parsing)
//! - **Landmark Errors**: the orchestrator boundary, carrying `FetchFailed`
//!
//! # Usage
//!
//! ```rust
//! use landmark_explorer::errors::{LandmarkError, LandmarkResult};
//!
//! fn example_function() -> LandmarkResult<usize> {
//!     Ok(0)
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for orchestrator results
pub type LandmarkResult<T> = Result<T, LandmarkError>;

/// Convenience type alias for persistent cache results
pub type CacheResult<T> = Result<T, CacheError>;

/// Convenience type alias for data source results
pub type SourceResult<T> = Result<T, SourceError>;
