//! Region queries and their qualifiers
//!
//! Queries validate on construction: an inverted bounding box or an
//! out-of-range centre is a caller bug and is reported as a `QueryError`
//! instead of being corrected silently.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::landmark::Coordinates;
use crate::errors::QueryError;
use crate::utils::geo::{haversine_km, is_valid_coordinate, km_per_degree_lon, KM_PER_DEGREE_LAT};

/// Language used when the caller does not pick one
pub const DEFAULT_LANGUAGE: &str = "en";

const MAX_LANGUAGE_LEN: usize = 16;

/// Where landmark data comes from
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DataSource {
    #[default]
    Encyclopedia,
    PlacesApi,
    Test,
}

/// Axis-aligned bounding box (no antimeridian wrap).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BoundsRepr", into = "BoundsRepr")]
pub struct BoundsQuery {
    south: f64,
    west: f64,
    north: f64,
    east: f64,
}

#[derive(Serialize, Deserialize)]
struct BoundsRepr {
    south: f64,
    west: f64,
    north: f64,
    east: f64,
}

impl TryFrom<BoundsRepr> for BoundsQuery {
    type Error = QueryError;

    fn try_from(r: BoundsRepr) -> Result<Self, Self::Error> {
        Self::new(r.south, r.west, r.north, r.east)
    }
}

impl From<BoundsQuery> for BoundsRepr {
    fn from(b: BoundsQuery) -> Self {
        Self {
            south: b.south,
            west: b.west,
            north: b.north,
            east: b.east,
        }
    }
}

impl BoundsQuery {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Result<Self, QueryError> {
        let invalid = |reason| QueryError::InvalidBounds {
            south,
            west,
            north,
            east,
            reason,
        };

        if !is_valid_coordinate(south, west) || !is_valid_coordinate(north, east) {
            return Err(invalid("corner outside valid coordinate range"));
        }
        if south >= north {
            return Err(invalid("south must be less than north"));
        }
        if west >= east {
            return Err(invalid("west must be less than east"));
        }

        Ok(Self {
            south,
            west,
            north,
            east,
        })
    }

    pub fn south(&self) -> f64 {
        self.south
    }

    pub fn west(&self) -> f64 {
        self.west
    }

    pub fn north(&self) -> f64 {
        self.north
    }

    pub fn east(&self) -> f64 {
        self.east
    }

    pub fn center(&self) -> Coordinates {
        Coordinates::new(
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }

    /// Distance from the centre to a corner
    pub fn half_diagonal_km(&self) -> f64 {
        haversine_km(
            Coordinates::new(self.south, self.west),
            Coordinates::new(self.north, self.east),
        ) / 2.0
    }

    pub fn contains(&self, point: Coordinates) -> bool {
        (self.south..=self.north).contains(&point.lat) && (self.west..=self.east).contains(&point.lon)
    }
}

/// Centre point plus radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RadiusRepr", into = "RadiusRepr")]
pub struct RadiusQuery {
    center_lat: f64,
    center_lon: f64,
    radius_km: f64,
}

#[derive(Serialize, Deserialize)]
struct RadiusRepr {
    center_lat: f64,
    center_lon: f64,
    radius_km: f64,
}

impl TryFrom<RadiusRepr> for RadiusQuery {
    type Error = QueryError;

    fn try_from(r: RadiusRepr) -> Result<Self, Self::Error> {
        Self::new(r.center_lat, r.center_lon, r.radius_km)
    }
}

impl From<RadiusQuery> for RadiusRepr {
    fn from(q: RadiusQuery) -> Self {
        Self {
            center_lat: q.center_lat,
            center_lon: q.center_lon,
            radius_km: q.radius_km,
        }
    }
}

impl RadiusQuery {
    pub fn new(center_lat: f64, center_lon: f64, radius_km: f64) -> Result<Self, QueryError> {
        if !is_valid_coordinate(center_lat, center_lon) {
            return Err(QueryError::InvalidCoordinates {
                lat: center_lat,
                lon: center_lon,
            });
        }
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(QueryError::InvalidRadius { radius_km });
        }

        Ok(Self {
            center_lat,
            center_lon,
            radius_km,
        })
    }

    pub fn center_lat(&self) -> f64 {
        self.center_lat
    }

    pub fn center_lon(&self) -> f64 {
        self.center_lon
    }

    pub fn radius_km(&self) -> f64 {
        self.radius_km
    }

    pub fn center(&self) -> Coordinates {
        Coordinates::new(self.center_lat, self.center_lon)
    }

    /// Approximate box around the circle, clamped to valid coordinates.
    pub fn bounding_box(&self) -> BoundsQuery {
        let d_lat = self.radius_km / KM_PER_DEGREE_LAT;
        let d_lon = self.radius_km / km_per_degree_lon(self.center_lat);

        BoundsQuery {
            south: (self.center_lat - d_lat).max(-90.0),
            west: (self.center_lon - d_lon).max(-180.0),
            north: (self.center_lat + d_lat).min(90.0),
            east: (self.center_lon + d_lon).min(180.0),
        }
    }
}

/// Geometry of a landmark lookup
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegionQuery {
    Bounds(BoundsQuery),
    Radius(RadiusQuery),
}

impl RegionQuery {
    pub fn bounds(south: f64, west: f64, north: f64, east: f64) -> Result<Self, QueryError> {
        BoundsQuery::new(south, west, north, east).map(Self::Bounds)
    }

    pub fn radius(center_lat: f64, center_lon: f64, radius_km: f64) -> Result<Self, QueryError> {
        RadiusQuery::new(center_lat, center_lon, radius_km).map(Self::Radius)
    }

    pub fn center(&self) -> Coordinates {
        match self {
            Self::Bounds(b) => b.center(),
            Self::Radius(r) => r.center(),
        }
    }

    /// Radius of the smallest circle around the centre covering the region
    pub fn covering_radius_km(&self) -> f64 {
        match self {
            Self::Bounds(b) => b.half_diagonal_km(),
            Self::Radius(r) => r.radius_km(),
        }
    }
}

impl From<BoundsQuery> for RegionQuery {
    fn from(b: BoundsQuery) -> Self {
        Self::Bounds(b)
    }
}

impl From<RadiusQuery> for RegionQuery {
    fn from(r: RadiusQuery) -> Self {
        Self::Radius(r)
    }
}

impl fmt::Display for RegionQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounds(b) => write!(
                f,
                "bounds(s={}, w={}, n={}, e={})",
                b.south, b.west, b.north, b.east
            ),
            Self::Radius(r) => write!(
                f,
                "radius({}, {}, {} km)",
                r.center_lat, r.center_lon, r.radius_km
            ),
        }
    }
}

/// Qualifiers orthogonal to the geometry of a query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "QualifiersRepr", into = "QualifiersRepr")]
pub struct Qualifiers {
    language: String,
    source: DataSource,
}

#[derive(Serialize, Deserialize)]
struct QualifiersRepr {
    language: String,
    source: DataSource,
}

impl TryFrom<QualifiersRepr> for Qualifiers {
    type Error = QueryError;

    fn try_from(r: QualifiersRepr) -> Result<Self, Self::Error> {
        Self::new(r.language, r.source)
    }
}

impl From<Qualifiers> for QualifiersRepr {
    fn from(q: Qualifiers) -> Self {
        Self {
            language: q.language,
            source: q.source,
        }
    }
}

impl Default for Qualifiers {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            source: DataSource::default(),
        }
    }
}

impl Qualifiers {
    /// Language codes are lower-cased; only ASCII alphanumerics and `-` are
    /// accepted since the code becomes part of a file name.
    pub fn new(language: impl AsRef<str>, source: DataSource) -> Result<Self, QueryError> {
        let language = language.as_ref().trim().to_ascii_lowercase();
        let safe = !language.is_empty()
            && language.len() <= MAX_LANGUAGE_LEN
            && language
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !safe {
            return Err(QueryError::InvalidLanguage { language });
        }

        Ok(Self { language, source })
    }

    pub fn for_source(source: DataSource) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn source(&self) -> DataSource {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_bounds_validation() {
        assert!(BoundsQuery::new(37.7, -122.5, 37.8, -122.3).is_ok());

        let err = BoundsQuery::new(37.8, -122.5, 37.7, -122.3).unwrap_err();
        assert!(matches!(err, QueryError::InvalidBounds { .. }));

        // degenerate boxes are rejected, not corrected
        assert!(BoundsQuery::new(37.7, -122.5, 37.7, -122.3).is_err());
        assert!(BoundsQuery::new(37.7, -122.3, 37.8, -122.3).is_err());
        assert!(BoundsQuery::new(-95.0, 0.0, 10.0, 1.0).is_err());
    }

    #[test]
    fn test_radius_validation() {
        assert!(RadiusQuery::new(37.7749, -122.4194, 5.0).is_ok());
        assert_eq!(
            RadiusQuery::new(37.7749, -122.4194, 0.0).unwrap_err(),
            QueryError::InvalidRadius { radius_km: 0.0 }
        );
        assert!(RadiusQuery::new(37.7749, -122.4194, -2.0).is_err());
        assert!(RadiusQuery::new(37.7749, -122.4194, f64::INFINITY).is_err());
        assert!(matches!(
            RadiusQuery::new(120.0, 0.0, 1.0),
            Err(QueryError::InvalidCoordinates { .. })
        ));
    }

    #[test]
    fn test_bounds_geometry() {
        let b = BoundsQuery::new(10.0, 20.0, 12.0, 24.0).unwrap();
        assert_eq!(b.center(), Coordinates::new(11.0, 22.0));
        assert!(b.contains(Coordinates::new(11.5, 23.0)));
        assert!(!b.contains(Coordinates::new(12.5, 23.0)));
        assert!(b.half_diagonal_km() > 100.0);
    }

    #[test]
    fn test_radius_bounding_box() {
        let r = RadiusQuery::new(0.0, 0.0, 111.0).unwrap();
        let b = r.bounding_box();
        assert!((b.north() - 1.0).abs() < 1e-9);
        assert!((b.south() + 1.0).abs() < 1e-9);
        assert!((b.east() - 1.0).abs() < 1e-9);

        let polar = RadiusQuery::new(89.9, 179.9, 50.0).unwrap().bounding_box();
        assert_eq!(polar.north(), 90.0);
        assert_eq!(polar.east(), 180.0);
        assert!(polar.south() < polar.north());
        assert!(polar.west() < polar.east());
    }

    #[test]
    fn test_region_query_serde_validates() {
        let q = RegionQuery::radius(37.7749, -122.4194, 5.0).unwrap();
        let json = serde_json::to_value(q).unwrap();
        assert_eq!(json["type"], "radius");
        assert_eq!(json["radius_km"], 5.0);
        let back: RegionQuery = serde_json::from_value(json).unwrap();
        assert_eq!(back, q);

        let bad = serde_json::json!({"type": "bounds", "south": 2.0, "west": 0.0, "north": 1.0, "east": 1.0});
        assert!(serde_json::from_value::<RegionQuery>(bad).is_err());
    }

    #[test]
    fn test_qualifiers() {
        let q = Qualifiers::default();
        assert_eq!(q.language(), "en");
        assert_eq!(q.source(), DataSource::Encyclopedia);

        let q = Qualifiers::new(" PT-br ", DataSource::Test).unwrap();
        assert_eq!(q.language(), "pt-br");

        assert!(Qualifiers::new("", DataSource::Test).is_err());
        assert!(Qualifiers::new("../etc", DataSource::Test).is_err());
        assert!(Qualifiers::new("en_US", DataSource::Test).is_err());
    }

    #[test]
    fn test_data_source_names() {
        assert_eq!(DataSource::PlacesApi.to_string(), "places-api");
        assert_eq!(DataSource::from_str("encyclopedia").unwrap(), DataSource::Encyclopedia);
        assert_eq!(
            serde_json::to_string(&DataSource::Test).unwrap(),
            "\"test\""
        );
    }
}
