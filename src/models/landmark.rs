//! Landmark records as produced by data sources and persisted by the cache

use serde::{Deserialize, Serialize};

use crate::errors::RecordError;
use crate::utils::geo::is_valid_coordinate;

/// Category used when a source does not tag its landmarks
pub const DEFAULT_LANDMARK_TYPE: &str = "landmark";

/// A WGS84 point. Serialized as a `[lat, lon]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        is_valid_coordinate(self.lat, self.lon)
    }
}

impl From<(f64, f64)> for Coordinates {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self { lat, lon }
    }
}

impl From<Coordinates> for (f64, f64) {
    fn from(c: Coordinates) -> Self {
        (c.lat, c.lon)
    }
}

/// A single landmark.
///
/// `image_ref` holds a remote URL while the record travels from a data source
/// to the cache, and a local file path (or nothing) once the cache has
/// resolved it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkRecord {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub image_ref: Option<String>,
    pub coordinates: Coordinates,
    #[serde(default)]
    pub distance_km: f64,
    #[serde(default)]
    pub relevance: f64,
    #[serde(rename = "type", default = "default_landmark_type")]
    pub kind: String,
}

fn default_landmark_type() -> String {
    DEFAULT_LANDMARK_TYPE.to_string()
}

impl LandmarkRecord {
    pub fn new(title: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            title: title.into(),
            summary: String::new(),
            source_url: String::new(),
            image_ref: None,
            coordinates,
            distance_km: 0.0,
            relevance: 0.0,
            kind: default_landmark_type(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }

    pub fn with_image_ref(mut self, image_ref: impl Into<String>) -> Self {
        let image_ref = image_ref.into();
        self.image_ref = (!image_ref.is_empty()).then_some(image_ref);
        self
    }

    pub fn with_distance_km(mut self, distance_km: f64) -> Self {
        self.distance_km = distance_km;
        self
    }

    pub fn with_relevance(mut self, relevance: f64) -> Self {
        self.relevance = relevance;
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        let kind = kind.into();
        self.kind = if kind.trim().is_empty() {
            default_landmark_type()
        } else {
            kind
        };
        self
    }

    /// Check the record against the data model ranges.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.title.trim().is_empty() {
            return Err(RecordError::EmptyTitle);
        }
        if !self.coordinates.is_valid() {
            return Err(RecordError::InvalidCoordinates {
                title: self.title.clone(),
                lat: self.coordinates.lat,
                lon: self.coordinates.lon,
            });
        }
        if !self.distance_km.is_finite() || self.distance_km < 0.0 {
            return Err(RecordError::InvalidDistance {
                title: self.title.clone(),
                distance_km: self.distance_km,
            });
        }
        if !(0.0..=1.0).contains(&self.relevance) {
            return Err(RecordError::RelevanceOutOfRange {
                title: self.title.clone(),
                relevance: self.relevance,
            });
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
