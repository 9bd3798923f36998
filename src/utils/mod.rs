//! Utility helpers for the landmark explorer

pub mod fs;
pub mod geo;

pub use geo::{haversine_km, is_valid_coordinate};
