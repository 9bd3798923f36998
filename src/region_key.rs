//! Region key encoder
//!
//! Derives the stable identifier a cache entry is stored under. Geometry is
//! rounded (coordinates to 3 decimals, roughly 100 m; radius to 1 decimal) so
//! jitter from repeated map interactions lands on the same entry. Two
//! distinct geometries that round to the same values intentionally share an
//! entry; that collision is the price of bounded precision.
//!
//! The key doubles as a file name, so every component is drawn from a safe
//! alphabet: formatted numbers, validated language codes and the kebab-case
//! name of the `DataSource` enum.

use std::fmt;

use crate::models::{Qualifiers, RegionQuery};

const COORD_DECIMALS: i32 = 3;
const RADIUS_DECIMALS: i32 = 1;
const DELIMITER: &str = "_";

/// Deterministic cache key for a region query plus qualifiers
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionKey(String);

impl RegionKey {
    pub fn encode(query: &RegionQuery, qualifiers: &Qualifiers) -> Self {
        let geometry = match query {
            RegionQuery::Bounds(b) => [
                "bounds".to_string(),
                format_coord(b.south()),
                format_coord(b.west()),
                format_coord(b.north()),
                format_coord(b.east()),
            ]
            .join(DELIMITER),
            RegionQuery::Radius(r) => [
                "radius".to_string(),
                format_coord(r.center_lat()),
                format_coord(r.center_lon()),
                format_rounded(r.radius_km(), RADIUS_DECIMALS),
            ]
            .join(DELIMITER),
        };

        let source = qualifiers.source().to_string();
        Self([geometry.as_str(), qualifiers.language(), source.as_str()].join(DELIMITER))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the entry file holding this key's records
    pub fn file_name(&self) -> String {
        format!("{}.json", self.0)
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RegionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn format_coord(value: f64) -> String {
    format_rounded(value, COORD_DECIMALS)
}

fn format_rounded(value: f64, decimals: i32) -> String {
    let factor = 10f64.powi(decimals);
    // adding 0.0 folds -0.0 into 0.0 so tiny negatives match tiny positives
    let rounded = (value * factor).round() / factor + 0.0;
    format!("{:.*}", decimals as usize, rounded)
}
