use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

/// Session counters for cache activity.
///
/// Owned by a [`LandmarkService`](super::LandmarkService) and shared by `Arc`
/// with whatever wants to display them.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    stale: AtomicU64,
    fetch_failures: AtomicU64,
    landmarks_cached: AtomicUsize,
    last_update: RwLock<Option<DateTime<Utc>>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    /// Includes stale reads
    pub misses: u64,
    pub stale: u64,
    pub fetch_failures: u64,
    /// Records stored by the most recent successful put
    pub landmarks_cached: usize,
    pub last_update: Option<DateTime<Utc>>,
}

impl CacheStatsSnapshot {
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Percentage of lookups served from cache, 0 when nothing was looked up
    pub fn hit_rate(&self) -> f64 {
        match self.lookups() {
            0 => 0.0,
            total => self.hits as f64 / total as f64 * 100.0,
        }
    }
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale(&self) {
        self.stale.fetch_add(1, Ordering::Relaxed);
        self.record_miss();
    }

    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn record_update(&self, landmarks: usize) {
        self.landmarks_cached.store(landmarks, Ordering::Relaxed);
        *self.last_update.write().await = Some(Utc::now());
    }

    pub async fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            landmarks_cached: self.landmarks_cached.load(Ordering::Relaxed),
            last_update: *self.last_update.read().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counters_and_hit_rate() {
        let stats = CacheStats::new();
        assert_eq!(stats.snapshot().await.hit_rate(), 0.0);

        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        stats.record_stale();
        stats.record_fetch_failure();

        let snapshot = stats.snapshot().await;
        assert_eq!(snapshot.hits, 3);
        assert_eq!(snapshot.misses, 2);
        assert_eq!(snapshot.stale, 1);
        assert_eq!(snapshot.fetch_failures, 1);
        assert_eq!(snapshot.lookups(), 5);
        assert!((snapshot.hit_rate() - 60.0).abs() < f64::EPSILON);
        assert_eq!(snapshot.last_update, None);
    }

    #[tokio::test]
    async fn test_record_update() {
        let stats = CacheStats::new();
        stats.record_update(12).await;

        let snapshot = stats.snapshot().await;
        assert_eq!(snapshot.landmarks_cached, 12);
        assert!(snapshot.last_update.is_some());
    }
}
