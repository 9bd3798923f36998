//! Domain models: landmark records, region queries and qualifiers

pub mod landmark;
pub mod region;

pub use landmark::{Coordinates, LandmarkRecord, DEFAULT_LANDMARK_TYPE};
pub use region::{BoundsQuery, DataSource, Qualifiers, RadiusQuery, RegionQuery, DEFAULT_LANGUAGE};
