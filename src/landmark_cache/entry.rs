use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{LandmarkRecord, Qualifiers, RegionQuery};
use crate::region_key::RegionKey;

/// One persisted cache file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub query: RegionQuery,
    pub qualifiers: Qualifiers,
    pub created_at: DateTime<Utc>,
    pub records: Vec<LandmarkRecord>,
}

impl CacheEntry {
    pub fn new(
        key: &RegionKey,
        query: &RegionQuery,
        qualifiers: &Qualifiers,
        records: Vec<LandmarkRecord>,
    ) -> Self {
        Self {
            key: key.to_string(),
            query: *query,
            qualifiers: qualifiers.clone(),
            created_at: Utc::now(),
            records,
        }
    }

    /// Age at `now`; entries stamped in the future are zero seconds old
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn is_fresh_at(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age_at(now) <= max_age
    }
}

/// Outcome of reading the entry for a key
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// No entry, or an entry that could not be read
    Miss,
    /// An entry older than the requested max age; left on disk
    Stale { entry: CacheEntry, age: Duration },
    Fresh(CacheEntry),
}

impl CacheLookup {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, Self::Miss)
    }

    /// Records of a fresh entry, empty otherwise
    pub fn fresh_records(self) -> Vec<LandmarkRecord> {
        match self {
            Self::Fresh(entry) => entry.records,
            Self::Miss | Self::Stale { .. } => Vec::new(),
        }
    }

    /// The entry regardless of its age
    pub fn into_entry(self) -> Option<CacheEntry> {
        match self {
            Self::Fresh(entry) | Self::Stale { entry, .. } => Some(entry),
            Self::Miss => None,
        }
    }
}
