use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, warn};

use super::entry::{CacheEntry, CacheLookup};
use crate::config::Config;
use crate::errors::{CacheError, CacheResult, DownloadError};
use crate::image_store::{is_remote_url, ImageOutcome, ImageStore, IMAGE_EXTENSION};
use crate::models::{LandmarkRecord, Qualifiers, RegionQuery};
use crate::region_key::RegionKey;
use crate::utils::fs::{age_of, write_atomic};

const ENTRY_EXTENSION: &str = "json";

/// Outcome of an age based sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub landmarks_removed: usize,
    pub images_removed: usize,
    /// Files that were due for removal but could not be deleted
    pub failures: usize,
}

impl SweepReport {
    pub fn total_removed(&self) -> usize {
        self.landmarks_removed + self.images_removed
    }
}

/// What the cache currently occupies on disk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheDiskStats {
    pub landmark_entries: usize,
    pub image_files: usize,
    pub total_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct LandmarkCacheStore {
    landmarks_dir: PathBuf,
    images: ImageStore,
    image_concurrency: usize,
}

impl LandmarkCacheStore {
    pub fn new(landmarks_dir: impl Into<PathBuf>, images: ImageStore, image_concurrency: usize) -> Self {
        Self {
            landmarks_dir: landmarks_dir.into(),
            images,
            image_concurrency: image_concurrency.max(1),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, DownloadError> {
        Ok(Self::new(
            config.storage.landmarks_dir(),
            ImageStore::from_config(config)?,
            config.cache.image_concurrency,
        ))
    }

    pub fn landmarks_dir(&self) -> &Path {
        &self.landmarks_dir
    }

    pub fn image_store(&self) -> &ImageStore {
        &self.images
    }

    pub fn entry_path(&self, key: &RegionKey) -> PathBuf {
        self.landmarks_dir.join(key.file_name())
    }

    /// Fresh records for the query, or an empty vector on a miss or a stale entry
    pub async fn get(
        &self,
        query: &RegionQuery,
        qualifiers: &Qualifiers,
        max_age: Duration,
    ) -> Vec<LandmarkRecord> {
        self.lookup(query, qualifiers, max_age).await.fresh_records()
    }

    pub async fn lookup(
        &self,
        query: &RegionQuery,
        qualifiers: &Qualifiers,
        max_age: Duration,
    ) -> CacheLookup {
        self.lookup_at(query, qualifiers, max_age, Utc::now()).await
    }

    /// Same as [`lookup`](Self::lookup), judging freshness at `now`
    pub async fn lookup_at(
        &self,
        query: &RegionQuery,
        qualifiers: &Qualifiers,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> CacheLookup {
        let key = RegionKey::encode(query, qualifiers);
        let Some(entry) = self.read_entry(&key).await else {
            debug!("Landmark cache miss for {}", key);
            return CacheLookup::Miss;
        };

        let age = entry.age_at(now);
        if age <= max_age {
            debug!(
                "Landmark cache hit for {} ({} records)",
                key,
                entry.records.len()
            );
            CacheLookup::Fresh(entry)
        } else {
            debug!(
                "Landmark cache entry {} is stale ({} old)",
                key,
                humantime::format_duration(Duration::from_secs(age.as_secs()))
            );
            CacheLookup::Stale { entry, age }
        }
    }

    /// Unreadable or corrupt entries are logged and reported as absent
    async fn read_entry(&self, key: &RegionKey) -> Option<CacheEntry> {
        let path = self.entry_path(key);
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read landmark cache {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_slice::<CacheEntry>(&data) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Ignoring corrupt landmark cache {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Replace the entry for the query with the valid subset of `records`.
    ///
    /// Remote image URLs are swapped for local paths (or cleared when the
    /// download fails) before the entry is written. Returns the records as
    /// stored; when none of them are valid nothing is written and the result
    /// is empty.
    pub async fn put(
        &self,
        query: &RegionQuery,
        qualifiers: &Qualifiers,
        records: Vec<LandmarkRecord>,
    ) -> CacheResult<Vec<LandmarkRecord>> {
        let key = RegionKey::encode(query, qualifiers);
        let submitted = records.len();

        let valid: Vec<LandmarkRecord> = records
            .into_iter()
            .filter(|record| match record.validate() {
                Ok(()) => true,
                Err(e) => {
                    warn!("Skipping invalid landmark for {}: {}", key, e);
                    false
                }
            })
            .collect();

        if valid.is_empty() {
            warn!(
                "No valid landmarks to cache for {} ({} submitted)",
                key, submitted
            );
            return Ok(Vec::new());
        }

        let resolved: Vec<LandmarkRecord> = stream::iter(valid)
            .map(|record| self.resolve_image(record))
            .buffered(self.image_concurrency)
            .collect()
            .await;

        let entry = CacheEntry::new(&key, query, qualifiers, resolved);
        self.write_entry(&key, &entry).await?;

        let with_images = entry
            .records
            .iter()
            .filter(|r| r.image_ref.is_some())
            .count();
        info!(
            "Cached {} landmarks for {} ({} with images, {} rejected)",
            entry.records.len(),
            key,
            with_images,
            submitted - entry.records.len()
        );

        Ok(entry.records)
    }

    async fn resolve_image(&self, mut record: LandmarkRecord) -> LandmarkRecord {
        let remote = match record.image_ref.as_deref() {
            Some(image_ref) if is_remote_url(image_ref) => image_ref.to_string(),
            // already local or absent
            _ => return record,
        };

        let outcome = self.images.resolve(&remote).await;
        if let ImageOutcome::Hit(path) = &outcome {
            debug!("Image for {} already cached at {}", record.title, path.display());
        }
        record.image_ref = outcome
            .path()
            .map(|path| path.to_string_lossy().into_owned());
        record
    }

    async fn write_entry(&self, key: &RegionKey, entry: &CacheEntry) -> CacheResult<()> {
        fs::create_dir_all(&self.landmarks_dir)
            .await
            .map_err(|e| CacheError::io(&self.landmarks_dir, e))?;

        let path = self.entry_path(key);
        let json = serde_json::to_vec_pretty(entry)?;
        write_atomic(&path, &json)
            .await
            .map_err(|e| CacheError::io(&path, e))?;

        debug!("Wrote landmark cache {} ({} bytes)", path.display(), json.len());
        Ok(())
    }

    /// Delete landmark entries and images last modified more than `max_age` ago.
    ///
    /// Every file is handled on its own; failures are logged, counted in the
    /// report and do not stop the sweep.
    pub async fn sweep(&self, max_age: Duration) -> SweepReport {
        let now = SystemTime::now();

        let (landmarks_removed, landmark_failures) =
            sweep_dir(&self.landmarks_dir, max_age, now).await;
        let (images_removed, image_failures) =
            sweep_dir(self.images.images_dir(), max_age, now).await;

        let report = SweepReport {
            landmarks_removed,
            images_removed,
            failures: landmark_failures + image_failures,
        };

        if report.total_removed() > 0 || report.failures > 0 {
            info!(
                "Cache sweep removed {} landmark entries and {} images ({} failures)",
                report.landmarks_removed, report.images_removed, report.failures
            );
        } else {
            debug!("Cache sweep found nothing older than {:?}", max_age);
        }
        report
    }

    pub async fn disk_stats(&self) -> CacheResult<CacheDiskStats> {
        let (landmark_entries, landmark_bytes) =
            count_files(&self.landmarks_dir, ENTRY_EXTENSION).await?;
        let (image_files, image_bytes) =
            count_files(self.images.images_dir(), IMAGE_EXTENSION).await?;

        Ok(CacheDiskStats {
            landmark_entries,
            image_files,
            total_bytes: landmark_bytes + image_bytes,
        })
    }
}

/// Two passes: collect expired files, then remove them one by one.
/// Returns `(removed, failures)`.
async fn sweep_dir(dir: &Path, max_age: Duration, now: SystemTime) -> (usize, usize) {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return (0, 0),
        Err(e) => {
            warn!("Failed to list {} for sweep: {}", dir.display(), e);
            return (0, 1);
        }
    };

    let mut expired = Vec::new();
    let mut failures = 0;
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to list {} for sweep: {}", dir.display(), e);
                failures += 1;
                break;
            }
        };

        let path = entry.path();
        match entry.metadata().await {
            Ok(metadata) if metadata.is_file() => {
                if age_of(&metadata, now) > max_age {
                    expired.push(path);
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Failed to stat {}: {}", path.display(), e);
                failures += 1;
            }
        }
    }

    let mut removed = 0;
    for path in expired {
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Removed expired cache file {}", path.display());
                removed += 1;
            }
            // removed concurrently, nothing left to do
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!("Failed to remove expired cache file {}: {}", path.display(), e);
                failures += 1;
            }
        }
    }

    (removed, failures)
}

/// Count regular files with `extension` in `dir` and their combined size
async fn count_files(dir: &Path, extension: &str) -> CacheResult<(usize, u64)> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((0, 0)),
        Err(e) => return Err(CacheError::io(dir, e)),
    };

    let mut count = 0;
    let mut bytes = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| CacheError::io(dir, e))?
    {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(extension) {
            continue;
        }
        let metadata = entry
            .metadata()
            .await
            .map_err(|e| CacheError::io(&path, e))?;
        if metadata.is_file() {
            count += 1;
            bytes += metadata.len();
        }
    }

    Ok((count, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_store::MockImageDownloader;
    use crate::models::{Coordinates, DataSource};
    use bytes::Bytes;
    use std::sync::Arc;
    use tempfile::TempDir;

    const IMAGE_URL: &str = "http://example/img.jpg";
    const DAY: Duration = Duration::from_secs(24 * 3600);

    fn store(dir: &TempDir, downloader: MockImageDownloader) -> LandmarkCacheStore {
        let images = ImageStore::new(dir.path().join("images"), Arc::new(downloader));
        LandmarkCacheStore::new(dir.path().join("landmarks"), images, 4)
    }

    fn downloader_serving(times: usize) -> MockImageDownloader {
        let mut downloader = MockImageDownloader::new();
        downloader
            .expect_download()
            .times(times)
            .returning(|_| Ok(Bytes::from_static(b"jpeg-bytes")));
        downloader
    }

    fn sf_query() -> RegionQuery {
        RegionQuery::radius(37.7749, -122.4194, 5.0).unwrap()
    }

    fn ferry_building() -> LandmarkRecord {
        LandmarkRecord::new("Ferry Building", Coordinates::new(37.7955, -122.3937))
            .with_summary("Terminal for ferries on the San Francisco Bay")
            .with_source_url("https://en.wikipedia.org/wiki/San_Francisco_Ferry_Building")
            .with_distance_km(2.3)
            .with_relevance(0.8)
            .with_image_ref(IMAGE_URL)
    }

    fn age_file(path: &Path, age: Duration) {
        std::fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::now() - age)
            .unwrap();
    }

    #[tokio::test]
    async fn test_put_then_get_resolves_image_to_local_path() {
        let dir = tempfile::tempdir().unwrap();
        let cache = store(&dir, downloader_serving(1));
        let quals = Qualifiers::default();

        let stored = cache
            .put(&sf_query(), &quals, vec![ferry_building()])
            .await
            .unwrap();
        let records = cache.get(&sf_query(), &quals, DAY).await;

        assert_eq!(records, stored);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.title, "Ferry Building");
        assert_eq!(record.coordinates, Coordinates::new(37.7955, -122.3937));
        assert_eq!(record.distance_km, 2.3);
        assert_eq!(record.relevance, 0.8);
        assert_eq!(record.kind, ferry_building().kind);
        assert_eq!(record.summary, ferry_building().summary);

        let image_ref = record.image_ref.as_deref().unwrap();
        assert_ne!(image_ref, IMAGE_URL);
        assert!(image_ref.ends_with(".jpg"));
        assert!(Path::new(image_ref).exists());
    }

    #[tokio::test]
    async fn test_shared_image_downloaded_once_across_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = store(&dir, downloader_serving(1));
        let quals = Qualifiers::default();
        let wider = RegionQuery::radius(37.7749, -122.4194, 8.0).unwrap();

        let first = cache
            .put(&sf_query(), &quals, vec![ferry_building()])
            .await
            .unwrap();
        let second = cache
            .put(&wider, &quals, vec![ferry_building()])
            .await
            .unwrap();

        let expected = cache.image_store().path_for(IMAGE_URL);
        assert_eq!(first[0].image_ref, second[0].image_ref);
        assert_eq!(
            second[0].image_ref.as_deref(),
            Some(expected.to_string_lossy().as_ref())
        );
    }

    #[tokio::test]
    async fn test_failed_download_clears_image_ref() {
        let dir = tempfile::tempdir().unwrap();
        let mut downloader = MockImageDownloader::new();
        downloader.expect_download().returning(|url| {
            Err(DownloadError::Status {
                status: 500,
                url: url.to_string(),
            })
        });
        let cache = store(&dir, downloader);

        let stored = cache
            .put(&sf_query(), &Qualifiers::default(), vec![ferry_building()])
            .await
            .unwrap();
        assert_eq!(stored[0].image_ref, None);
        assert_eq!(stored[0].title, "Ferry Building");
    }

    #[tokio::test]
    async fn test_local_image_ref_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let mut downloader = MockImageDownloader::new();
        downloader.expect_download().never();
        let cache = store(&dir, downloader);

        let record = ferry_building().with_image_ref("/srv/images/ferry.jpg");
        let stored = cache
            .put(&sf_query(), &Qualifiers::default(), vec![record])
            .await
            .unwrap();
        assert_eq!(stored[0].image_ref.as_deref(), Some("/srv/images/ferry.jpg"));
    }

    #[tokio::test]
    async fn test_stale_entry_is_a_miss_but_stays_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cache = store(&dir, downloader_serving(1));
        let quals = Qualifiers::default();
        cache
            .put(&sf_query(), &quals, vec![ferry_building()])
            .await
            .unwrap();

        let later = Utc::now() + chrono::Duration::hours(24) + chrono::Duration::seconds(5);
        let lookup = cache.lookup_at(&sf_query(), &quals, DAY, later).await;
        match &lookup {
            CacheLookup::Stale { entry, age } => {
                assert!(*age > DAY);
                assert_eq!(entry.records.len(), 1);
            }
            other => panic!("expected stale entry, got {other:?}"),
        }
        assert!(lookup.fresh_records().is_empty());

        let key = RegionKey::encode(&sf_query(), &quals);
        assert!(cache.entry_path(&key).exists());
        assert!(cache.lookup(&sf_query(), &quals, DAY).await.is_fresh());
    }

    #[tokio::test]
    async fn test_miss_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = store(&dir, MockImageDownloader::new());
        assert!(cache.get(&sf_query(), &Qualifiers::default(), DAY).await.is_empty());
        assert!(cache
            .lookup(&sf_query(), &Qualifiers::default(), DAY)
            .await
            .is_miss());
    }

    #[tokio::test]
    async fn test_invalid_records_skipped_individually() {
        let dir = tempfile::tempdir().unwrap();
        let cache = store(&dir, MockImageDownloader::new());
        let quals = Qualifiers::default();

        let records = vec![
            LandmarkRecord::new("Coit Tower", Coordinates::new(37.8024, -122.4058)),
            LandmarkRecord::new("Nowhere", Coordinates::new(200.0, 0.0)),
            LandmarkRecord::new("Palace of Fine Arts", Coordinates::new(37.8029, -122.4484)),
        ];
        let stored = cache.put(&sf_query(), &quals, records).await.unwrap();

        let titles: Vec<_> = stored.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Coit Tower", "Palace of Fine Arts"]);
        assert_eq!(cache.get(&sf_query(), &quals, DAY).await, stored);
    }

    #[tokio::test]
    async fn test_all_invalid_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = store(&dir, MockImageDownloader::new());
        let quals = Qualifiers::default();

        let stored = cache
            .put(
                &sf_query(),
                &quals,
                vec![LandmarkRecord::new("", Coordinates::new(1.0, 1.0))],
            )
            .await
            .unwrap();

        assert!(stored.is_empty());
        assert!(!cache
            .entry_path(&RegionKey::encode(&sf_query(), &quals))
            .exists());
    }

    #[tokio::test]
    async fn test_second_put_replaces_first() {
        let dir = tempfile::tempdir().unwrap();
        let cache = store(&dir, MockImageDownloader::new());
        let quals = Qualifiers::default();

        cache
            .put(
                &sf_query(),
                &quals,
                vec![
                    LandmarkRecord::new("Coit Tower", Coordinates::new(37.8024, -122.4058)),
                    LandmarkRecord::new("Lombard Street", Coordinates::new(37.8021, -122.4187)),
                ],
            )
            .await
            .unwrap();
        cache
            .put(
                &sf_query(),
                &quals,
                vec![LandmarkRecord::new("Alcatraz", Coordinates::new(37.8267, -122.4230))],
            )
            .await
            .unwrap();

        let titles: Vec<_> = cache
            .get(&sf_query(), &quals, DAY)
            .await
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["Alcatraz".to_string()]);
    }

    #[tokio::test]
    async fn test_record_order_preserved_with_concurrent_images() {
        let dir = tempfile::tempdir().unwrap();
        let cache = store(&dir, downloader_serving(6));

        let records: Vec<_> = (0..6)
            .map(|i| {
                LandmarkRecord::new(format!("Landmark {i}"), Coordinates::new(37.78, -122.41))
                    .with_image_ref(format!("https://img.example.org/{i}.jpg"))
            })
            .collect();
        let stored = cache
            .put(&sf_query(), &Qualifiers::default(), records)
            .await
            .unwrap();

        for (i, record) in stored.iter().enumerate() {
            assert_eq!(record.title, format!("Landmark {i}"));
            assert!(record.image_ref.is_some());
        }
        assert_eq!(cache.disk_stats().await.unwrap().image_files, 6);
    }

    #[tokio::test]
    async fn test_qualifiers_isolate_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = store(&dir, MockImageDownloader::new());
        let english = Qualifiers::default();
        let german = Qualifiers::new("de", DataSource::Encyclopedia).unwrap();

        cache
            .put(
                &sf_query(),
                &english,
                vec![LandmarkRecord::new("Coit Tower", Coordinates::new(37.8024, -122.4058))],
            )
            .await
            .unwrap();

        assert!(cache.get(&sf_query(), &german, DAY).await.is_empty());
        assert_eq!(cache.get(&sf_query(), &english, DAY).await.len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = store(&dir, MockImageDownloader::new());
        let quals = Qualifiers::default();
        let key = RegionKey::encode(&sf_query(), &quals);

        fs::create_dir_all(cache.landmarks_dir()).await.unwrap();
        fs::write(cache.entry_path(&key), b"{\"records\": [trunc")
            .await
            .unwrap();

        assert!(cache.lookup(&sf_query(), &quals, DAY).await.is_miss());
        assert!(cache.get(&sf_query(), &quals, DAY).await.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = store(&dir, MockImageDownloader::new());
        let quals = Qualifiers::default();

        let queries = [
            RegionQuery::radius(37.0, -122.0, 1.0).unwrap(),
            RegionQuery::radius(38.0, -122.0, 1.0).unwrap(),
            RegionQuery::radius(39.0, -122.0, 1.0).unwrap(),
        ];
        let ages = [
            Duration::from_secs(3600),
            Duration::from_secs(25 * 3600),
            Duration::from_secs(48 * 3600),
        ];
        for (query, age) in queries.iter().zip(ages) {
            cache
                .put(
                    query,
                    &quals,
                    vec![LandmarkRecord::new("Somewhere", query.center())],
                )
                .await
                .unwrap();
            age_file(&cache.entry_path(&RegionKey::encode(query, &quals)), age);
        }

        let report = cache.sweep(DAY).await;
        assert_eq!(report.landmarks_removed, 2);
        assert_eq!(report.total_removed(), 2);
        assert_eq!(report.failures, 0);

        assert!(cache.entry_path(&RegionKey::encode(&queries[0], &quals)).exists());
        assert!(!cache.entry_path(&RegionKey::encode(&queries[1], &quals)).exists());
        assert!(!cache.entry_path(&RegionKey::encode(&queries[2], &quals)).exists());
    }

    #[tokio::test]
    async fn test_sweep_covers_images_independently() {
        let dir = tempfile::tempdir().unwrap();
        let cache = store(&dir, MockImageDownloader::new());
        let images_dir = cache.image_store().images_dir().to_path_buf();
        fs::create_dir_all(&images_dir).await.unwrap();

        let old = images_dir.join("old.jpg");
        let recent = images_dir.join("recent.jpg");
        fs::write(&old, b"a").await.unwrap();
        fs::write(&recent, b"b").await.unwrap();
        age_file(&old, Duration::from_secs(30 * 3600));

        let report = cache.sweep(DAY).await;
        assert_eq!(
            report,
            SweepReport {
                landmarks_removed: 0,
                images_removed: 1,
                failures: 0
            }
        );
        assert!(!old.exists());
        assert!(recent.exists());
    }

    #[tokio::test]
    async fn test_sweep_of_missing_directories_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = store(&dir, MockImageDownloader::new());
        assert_eq!(cache.sweep(DAY).await, SweepReport::default());
    }

    #[tokio::test]
    async fn test_disk_stats() {
        let dir = tempfile::tempdir().unwrap();
        let cache = store(&dir, downloader_serving(1));
        assert_eq!(cache.disk_stats().await.unwrap(), CacheDiskStats::default());

        cache
            .put(&sf_query(), &Qualifiers::default(), vec![ferry_building()])
            .await
            .unwrap();

        let stats = cache.disk_stats().await.unwrap();
        assert_eq!(stats.landmark_entries, 1);
        assert_eq!(stats.image_files, 1);
        assert!(stats.total_bytes > b"jpeg-bytes".len() as u64);
    }
}
