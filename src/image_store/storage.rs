use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};
use url::Url;

use super::downloader::{HttpImageDownloader, ImageDownloader};
use crate::config::Config;
use crate::errors::DownloadError;
use crate::utils::fs::write_atomic;

/// Every cached image is stored with this extension regardless of its real format
pub const IMAGE_EXTENSION: &str = "jpg";

/// Result of resolving one image URL against the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    /// A readable copy was already on disk
    Hit(PathBuf),
    /// Freshly downloaded and written
    Downloaded { path: PathBuf, bytes: u64 },
    /// Nothing usable locally; the reason has already been logged
    Unavailable,
}

impl ImageOutcome {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Hit(path) | Self::Downloaded { path, .. } => Some(path),
            Self::Unavailable => None,
        }
    }

    pub fn into_path(self) -> Option<PathBuf> {
        match self {
            Self::Hit(path) | Self::Downloaded { path, .. } => Some(path),
            Self::Unavailable => None,
        }
    }
}

/// True for absolute `http`/`https` URLs with a host
pub fn is_remote_url(value: &str) -> bool {
    parse_remote_url(value).is_some()
}

fn parse_remote_url(value: &str) -> Option<Url> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let url = Url::parse(value).ok()?;
    match url.scheme() {
        "http" | "https" if url.host().is_some() => Some(url),
        _ => None,
    }
}

#[derive(Clone)]
pub struct ImageStore {
    images_dir: PathBuf,
    downloader: Arc<dyn ImageDownloader>,
}

impl std::fmt::Debug for ImageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageStore")
            .field("images_dir", &self.images_dir)
            .finish_non_exhaustive()
    }
}

impl ImageStore {
    /// Paths handed out by the store are absolute even when `images_dir` is not
    pub fn new(images_dir: impl Into<PathBuf>, downloader: Arc<dyn ImageDownloader>) -> Self {
        let images_dir = images_dir.into();
        let images_dir = std::path::absolute(&images_dir).unwrap_or(images_dir);
        Self {
            images_dir,
            downloader,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, DownloadError> {
        let downloader = HttpImageDownloader::from_config(&config.http)?;
        Ok(Self::new(config.storage.images_dir(), Arc::new(downloader)))
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Hex md5 of the URL exactly as given
    pub fn content_hash(url: &str) -> String {
        format!("{:x}", md5::compute(url.as_bytes()))
    }

    pub fn path_for(&self, url: &str) -> PathBuf {
        self.images_dir
            .join(format!("{}.{IMAGE_EXTENSION}", Self::content_hash(url)))
    }

    /// Local path of the image at `url`, downloading it when no readable copy
    /// exists. Failures are logged and yield `None`.
    pub async fn ensure_cached(&self, url: &str) -> Option<PathBuf> {
        self.resolve(url).await.into_path()
    }

    pub async fn resolve(&self, url: &str) -> ImageOutcome {
        let Some(parsed) = parse_remote_url(url) else {
            if !url.trim().is_empty() {
                debug!("Skipping image with non-http URL: {}", url);
            }
            return ImageOutcome::Unavailable;
        };

        let path = self.path_for(url);
        if is_readable(&path).await {
            debug!("Using cached image {} for {}", path.display(), url);
            touch(&path).await;
            return ImageOutcome::Hit(path);
        }

        match self.download_to(&parsed, &path).await {
            Ok(bytes) => {
                info!(
                    "Cached image {} ({} bytes) at {}",
                    url,
                    bytes,
                    path.display()
                );
                ImageOutcome::Downloaded { path, bytes }
            }
            Err(e) => {
                warn!("Failed to cache image {}: {}", url, e);
                ImageOutcome::Unavailable
            }
        }
    }

    async fn download_to(&self, url: &Url, path: &Path) -> Result<u64, DownloadError> {
        let data = self.downloader.download(url).await?;

        fs::create_dir_all(&self.images_dir)
            .await
            .map_err(|source| DownloadError::Io {
                path: self.images_dir.clone(),
                source,
            })?;
        write_atomic(path, &data)
            .await
            .map_err(|source| DownloadError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(data.len() as u64)
    }
}

/// An existing file only counts as cached when at least one byte can be read
/// from it; empty or unreadable files are downloaded again.
async fn is_readable(path: &Path) -> bool {
    let mut file = match fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return false,
        Err(e) => {
            warn!("Cached image {} is unreadable: {}", path.display(), e);
            return false;
        }
    };

    let mut first_byte = [0u8; 1];
    match file.read(&mut first_byte).await {
        Ok(0) => {
            warn!("Cached image {} is empty", path.display());
            false
        }
        Ok(_) => true,
        Err(e) => {
            warn!("Cached image {} is unreadable: {}", path.display(), e);
            false
        }
    }
}

/// Refresh the modification time so sweeps keep images that are still in use
async fn touch(path: &Path) {
    let target = path.to_path_buf();
    let result = tokio::task::spawn_blocking(move || {
        std::fs::File::options()
            .write(true)
            .open(&target)?
            .set_modified(SystemTime::now())
    })
    .await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("Could not refresh mtime of {}: {}", path.display(), e),
        Err(e) => debug!("Could not refresh mtime of {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_store::MockImageDownloader;
    use bytes::Bytes;
    use rstest::rstest;
    use std::time::Duration;

    const IMAGE_URL: &str = "https://upload.example.org/thumb/ferry.jpg";

    fn store_with(dir: &Path, downloader: MockImageDownloader) -> ImageStore {
        ImageStore::new(dir.join("images"), Arc::new(downloader))
    }

    #[rstest]
    #[case("https://example.org/a.jpg", true)]
    #[case("http://example.org/a.jpg", true)]
    #[case("  https://example.org/a.jpg ", true)]
    #[case("", false)]
    #[case("   ", false)]
    #[case("/var/cache/images/a.jpg", false)]
    #[case("file:///tmp/a.jpg", false)]
    #[case("ftp://example.org/a.jpg", false)]
    #[case("not a url", false)]
    fn test_is_remote_url(#[case] value: &str, #[case] expected: bool) {
        assert_eq!(is_remote_url(value), expected);
    }

    #[test]
    fn test_path_is_md5_of_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(dir.path(), MockImageDownloader::new());
        let path = store.path_for(IMAGE_URL);

        assert!(path.is_absolute());
        assert_eq!(path.parent(), Some(store.images_dir()));
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            format!("{:x}.jpg", md5::compute(IMAGE_URL))
        );
        assert_eq!(ImageStore::content_hash(IMAGE_URL).len(), 32);
    }

    #[tokio::test]
    async fn test_second_request_does_not_download_again() {
        let dir = tempfile::tempdir().unwrap();
        let mut downloader = MockImageDownloader::new();
        downloader
            .expect_download()
            .withf(|url| url.as_str() == IMAGE_URL)
            .times(1)
            .returning(|_| Ok(Bytes::from_static(b"\xff\xd8\xff\xe0jpeg")));
        let store = store_with(dir.path(), downloader);

        let first = store.resolve(IMAGE_URL).await;
        let path = match &first {
            ImageOutcome::Downloaded { path, bytes } => {
                assert_eq!(*bytes, 8);
                path.clone()
            }
            other => panic!("expected download, got {other:?}"),
        };
        assert_eq!(fs::read(&path).await.unwrap(), b"\xff\xd8\xff\xe0jpeg");

        let second = store.resolve(IMAGE_URL).await;
        assert_eq!(second, ImageOutcome::Hit(path.clone()));
        assert_eq!(store.ensure_cached(IMAGE_URL).await, Some(path));
    }

    #[tokio::test]
    async fn test_non_ok_status_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut downloader = MockImageDownloader::new();
        downloader.expect_download().times(1).returning(|url| {
            Err(DownloadError::Status {
                status: 404,
                url: url.to_string(),
            })
        });
        let store = store_with(dir.path(), downloader);

        assert_eq!(store.ensure_cached(IMAGE_URL).await, None);
        assert!(!store.path_for(IMAGE_URL).exists());
    }

    #[tokio::test]
    async fn test_empty_and_local_urls_are_never_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        let mut downloader = MockImageDownloader::new();
        downloader.expect_download().never();
        let store = store_with(dir.path(), downloader);

        assert_eq!(store.ensure_cached("").await, None);
        assert_eq!(store.ensure_cached("/tmp/local.jpg").await, None);
        // unusable URLs never reach the downloader, so there is no download error for them
        assert_eq!(store.resolve("ftp://example/img.jpg").await, ImageOutcome::Unavailable);
        assert_eq!(store.resolve("http://").await, ImageOutcome::Unavailable);
        assert!(!store.images_dir().exists());
    }

    #[tokio::test]
    async fn test_empty_file_is_downloaded_again() {
        let dir = tempfile::tempdir().unwrap();
        let mut downloader = MockImageDownloader::new();
        downloader
            .expect_download()
            .times(1)
            .returning(|_| Ok(Bytes::from_static(b"image")));
        let store = store_with(dir.path(), downloader);

        fs::create_dir_all(store.images_dir()).await.unwrap();
        let path = store.path_for(IMAGE_URL);
        fs::write(&path, b"").await.unwrap();

        assert_eq!(
            store.resolve(IMAGE_URL).await,
            ImageOutcome::Downloaded {
                path: path.clone(),
                bytes: 5
            }
        );
        assert_eq!(fs::read(&path).await.unwrap(), b"image");
    }

    #[tokio::test]
    async fn test_hit_refreshes_modification_time() {
        let dir = tempfile::tempdir().unwrap();
        let mut downloader = MockImageDownloader::new();
        downloader.expect_download().never();
        let store = store_with(dir.path(), downloader);

        fs::create_dir_all(store.images_dir()).await.unwrap();
        let path = store.path_for(IMAGE_URL);
        fs::write(&path, b"image").await.unwrap();
        let old = SystemTime::now() - Duration::from_secs(48 * 3600);
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(old)
            .unwrap();

        assert!(matches!(store.resolve(IMAGE_URL).await, ImageOutcome::Hit(_)));

        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();
        assert!(modified > old + Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_too_large_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let mut downloader = MockImageDownloader::new();
        downloader.expect_download().returning(|_| {
            Err(DownloadError::TooLarge {
                size: 20,
                limit: 10,
            })
        });
        let store = store_with(dir.path(), downloader);

        assert_eq!(store.resolve(IMAGE_URL).await, ImageOutcome::Unavailable);
        assert_eq!(ImageOutcome::Unavailable.path(), None);
    }
}
