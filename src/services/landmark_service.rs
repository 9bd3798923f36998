use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::cache_stats::CacheStats;
use crate::config::Config;
use crate::errors::{LandmarkError, LandmarkResult, QueryError};
use crate::landmark_cache::{CacheLookup, LandmarkCacheStore};
use crate::models::{DataSource, LandmarkRecord, Qualifiers, RegionQuery};
use crate::sources::{build_source, LandmarkSource};

/// Cache orchestrator: serves landmarks from the cache and falls back to the
/// data source on a miss, storing what it fetched.
#[derive(Clone)]
pub struct LandmarkService {
    cache: Arc<LandmarkCacheStore>,
    source: Arc<dyn LandmarkSource>,
    stats: Arc<CacheStats>,
}

impl LandmarkService {
    pub fn new(cache: Arc<LandmarkCacheStore>, source: Arc<dyn LandmarkSource>) -> Self {
        Self {
            cache,
            source,
            stats: Arc::new(CacheStats::new()),
        }
    }

    /// Share statistics with another owner instead of starting fresh ones
    pub fn with_stats(mut self, stats: Arc<CacheStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn from_config(config: &Config) -> LandmarkResult<Self> {
        let cache = LandmarkCacheStore::from_config(config).map_err(|e| {
            LandmarkError::Configuration {
                message: format!("image downloader: {e}"),
            }
        })?;
        let source = build_source(config).map_err(|e| LandmarkError::Configuration {
            message: format!("landmark source: {e}"),
        })?;

        Ok(Self::new(Arc::new(cache), source))
    }

    pub fn cache(&self) -> &Arc<LandmarkCacheStore> {
        &self.cache
    }

    pub fn stats(&self) -> &Arc<CacheStats> {
        &self.stats
    }

    pub fn source_kind(&self) -> DataSource {
        self.source.kind()
    }

    /// Qualifiers for `language` bound to this service's source, so cached
    /// entries are keyed by the source that actually produced them
    pub fn qualifiers(&self, language: &str) -> Result<Qualifiers, QueryError> {
        Qualifiers::new(language, self.source.kind())
    }

    /// Fresh cached records, or records fetched from the source and cached.
    ///
    /// A fetch error is returned as [`LandmarkError::FetchFailed`]. An empty
    /// fetch result is returned as is and never cached. When storing fails the
    /// fetched records are still returned.
    pub async fn get_or_fetch(
        &self,
        query: &RegionQuery,
        qualifiers: &Qualifiers,
        max_age: Duration,
    ) -> LandmarkResult<Vec<LandmarkRecord>> {
        match self.cache.lookup(query, qualifiers, max_age).await {
            CacheLookup::Fresh(entry) if !entry.records.is_empty() => {
                self.stats.record_hit();
                return Ok(entry.records);
            }
            CacheLookup::Stale { age, .. } => {
                debug!(
                    "Refetching {} landmarks, cached entry is {}s old",
                    query,
                    age.as_secs()
                );
                self.stats.record_stale();
            }
            CacheLookup::Fresh(_) | CacheLookup::Miss => self.stats.record_miss(),
        }

        let fetched = match self.source.fetch(query, qualifiers).await {
            Ok(records) => records,
            Err(error) => {
                self.stats.record_fetch_failure();
                warn!("Failed to fetch landmarks for {}: {}", query, error);
                return Err(LandmarkError::FetchFailed {
                    source_kind: self.source.kind(),
                    error,
                });
            }
        };

        if fetched.is_empty() {
            info!("No landmarks found for {}, nothing cached", query);
            return Ok(Vec::new());
        }

        match self.cache.put(query, qualifiers, fetched.clone()).await {
            Ok(stored) => {
                self.stats.record_update(stored.len()).await;
                Ok(stored)
            }
            Err(e) => {
                error!("Failed to cache landmarks for {}: {}", query, e);
                Ok(fetched.into_iter().filter(LandmarkRecord::is_valid).collect())
            }
        }
    }

    /// Whatever is cached for the query regardless of age. Never touches the
    /// network.
    pub async fn get_offline(
        &self,
        query: &RegionQuery,
        qualifiers: &Qualifiers,
    ) -> Vec<LandmarkRecord> {
        self.cache
            .lookup(query, qualifiers, Duration::MAX)
            .await
            .into_entry()
            .map(|entry| entry.records)
            .unwrap_or_default()
    }
}
