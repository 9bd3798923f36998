//! Network side of the image store

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use tracing::trace;
use url::Url;

use crate::config::HttpConfig;
use crate::errors::DownloadError;

/// Fetches raw image bytes for a URL
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageDownloader: Send + Sync {
    async fn download(&self, url: &Url) -> Result<Bytes, DownloadError>;
}

/// `reqwest` backed downloader. Only a `200 OK` body counts as an image.
#[derive(Debug, Clone)]
pub struct HttpImageDownloader {
    client: reqwest::Client,
    max_bytes: u64,
}

impl HttpImageDownloader {
    pub fn new(timeout: Duration, user_agent: &str, max_bytes: u64) -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client, max_bytes })
    }

    pub fn from_config(http: &HttpConfig) -> Result<Self, DownloadError> {
        Self::new(http.image_timeout, &http.user_agent, http.max_image_bytes)
    }
}

#[async_trait]
impl ImageDownloader for HttpImageDownloader {
    async fn download(&self, url: &Url) -> Result<Bytes, DownloadError> {
        trace!("Downloading image {}", url);
        let response = self.client.get(url.clone()).send().await?;

        if response.status() != StatusCode::OK {
            return Err(DownloadError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        if let Some(size) = response.content_length() {
            if size > self.max_bytes {
                return Err(DownloadError::TooLarge {
                    size,
                    limit: self.max_bytes,
                });
            }
        }

        // chunked responses carry no length up front
        let bytes = response.bytes().await?;
        if bytes.len() as u64 > self.max_bytes {
            return Err(DownloadError::TooLarge {
                size: bytes.len() as u64,
                limit: self.max_bytes,
            });
        }

        Ok(bytes)
    }
}
