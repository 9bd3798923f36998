//! Filesystem helpers shared by the image store and the landmark cache

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::fs;
use uuid::Uuid;

/// Suffix of in-flight writes; such files are never read as cache content
pub const TEMP_SUFFIX: &str = ".tmp";

/// Write `contents` to a uniquely named sibling temp file, then rename it over
/// `path`. Readers see either the old file or the complete new one.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let temp_path = temp_path_for(path);

    if let Err(e) = fs::write(&temp_path, contents).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e);
    }
    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e);
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(
        ".{file_name}.{}{TEMP_SUFFIX}",
        Uuid::new_v4().simple()
    ))
}

/// Time since the file was last modified. Files stamped in the future are
/// treated as brand new.
pub fn age_of(metadata: &std::fs::Metadata, now: SystemTime) -> Duration {
    metadata
        .modified()
        .ok()
        .and_then(|modified| now.duration_since(modified).ok())
        .unwrap_or_default()
}
