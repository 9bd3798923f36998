//! Geodesy helpers shared by queries, records and data sources

use crate::models::Coordinates;

/// Mean Earth radius used for great-circle distances
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Rough length of one degree of latitude
pub const KM_PER_DEGREE_LAT: f64 = 111.0;

/// True when both components are finite and within the WGS84 ranges
pub fn is_valid_coordinate(lat: f64, lon: f64) -> bool {
    lat.is_finite()
        && lon.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lon)
}

/// Great-circle distance between two points in kilometres (haversine)
pub fn haversine_km(from: Coordinates, to: Coordinates) -> f64 {
    let (lat1, lat2) = (from.lat.to_radians(), to.lat.to_radians());
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lon = (to.lon - from.lon).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Kilometres covered by one degree of longitude at the given latitude.
/// Never returns zero so callers can divide by it near the poles.
pub fn km_per_degree_lon(lat: f64) -> f64 {
    (KM_PER_DEGREE_LAT * lat.to_radians().cos().abs()).max(1e-6)
}
