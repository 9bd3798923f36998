//! Image store
//!
//! Content-addressed local copies of remote landmark images. Each image URL
//! maps to `{md5(url)}.jpg` under the images directory and is downloaded at
//! most once while that file exists and is readable.

pub mod downloader;
pub mod storage;

pub use downloader::{HttpImageDownloader, ImageDownloader};
pub use storage::{is_remote_url, ImageOutcome, ImageStore, IMAGE_EXTENSION};

#[cfg(test)]
pub use downloader::MockImageDownloader;
