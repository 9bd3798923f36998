//! Error type definitions for the landmark explorer
//!
//! This module defines all error types used throughout the crate, providing a
//! hierarchical error system. Only `QueryError` represents a caller bug; the
//! rest describe environmental conditions that callers are expected to absorb
//! or degrade around.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::DataSource;

/// Top-level error surfaced by the cache orchestrator
#[derive(Error, Debug)]
pub enum LandmarkError {
    /// The data source adapter could not produce landmarks
    #[error("Fetch failed: {source_kind} - {error}")]
    FetchFailed {
        source_kind: DataSource,
        #[source]
        error: SourceError,
    },

    /// The caller built an invalid query
    #[error("Invalid query: {0}")]
    Query(#[from] QueryError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Contract violations detected while constructing a region query
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// Bounds must satisfy south < north and west < east
    #[error("Invalid bounds: south={south} west={west} north={north} east={east} ({reason})")]
    InvalidBounds {
        south: f64,
        west: f64,
        north: f64,
        east: f64,
        reason: &'static str,
    },

    /// Latitude or longitude outside the valid range or not finite
    #[error("Invalid coordinates: lat={lat}, lon={lon}")]
    InvalidCoordinates { lat: f64, lon: f64 },

    /// Radius must be finite and strictly positive
    #[error("Invalid radius: {radius_km} km")]
    InvalidRadius { radius_km: f64 },

    /// Language codes end up in file names, so only a safe alphabet is accepted
    #[error("Invalid language code: {language:?}")]
    InvalidLanguage { language: String },
}

/// Validation failures for a single landmark record
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("Landmark title is empty")]
    EmptyTitle,

    #[error("Invalid coordinates for {title:?}: lat={lat}, lon={lon}")]
    InvalidCoordinates { title: String, lat: f64, lon: f64 },

    #[error("Invalid distance for {title:?}: {distance_km} km")]
    InvalidDistance { title: String, distance_km: f64 },

    #[error("Relevance out of range for {title:?}: {relevance}")]
    RelevanceOutOfRange { title: String, relevance: f64 },
}

/// Image download failures
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Transport level failure, including timeouts
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Anything but 200 OK
    #[error("Unexpected HTTP status {status} for {url}")]
    Status { status: u16, url: String },

    /// Response larger than the configured limit
    #[error("Image too large: {size} bytes (max {limit})")]
    TooLarge { size: u64, limit: u64 },

    /// The body could not be written into the image directory
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Persistent store failures
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Data source adapter failures
#[derive(Error, Debug)]
pub enum SourceError {
    /// Transport level failure, including timeouts
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status from the upstream API
    #[error("HTTP status {status}: {message}")]
    Status { status: u16, message: String },

    /// The upstream API answered with an error document
    #[error("API error {code}: {info}")]
    Api { code: String, info: String },

    /// The upstream response could not be understood
    #[error("Parse error: {source_name} - {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    /// The selected source is not available in this build or configuration
    #[error("Source not configured: {source_kind}")]
    NotConfigured { source_kind: DataSource },
}
