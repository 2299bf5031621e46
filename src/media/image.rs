//! Direct image downloads.
//!
//! Image links are fetched with a plain GET instead of the extractor: a
//! browser-like user agent, a fixed timeout, body streamed to disk.

use super::{Artifact, MediaKind};
use crate::config::BROWSER_USER_AGENT;
use crate::error::{ExtractionFailure, RelayError};
use anyhow::Result;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode, Url};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Fallback file name when the URL has no usable last segment
const DEFAULT_IMAGE_NAME: &str = "image.jpg";

/// HTTP downloader for direct image links
#[derive(Clone)]
pub struct ImageDownloader {
    client: Client,
    max_bytes: u64,
}

impl ImageDownloader {
    /// Create a downloader with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {e}"))?;
        Ok(Self {
            client,
            max_bytes: u64::MAX,
        })
    }

    /// Abort downloads that grow past `max_bytes`
    #[must_use]
    pub const fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Download `url` into `workdir`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::ExtractionFailed`] on HTTP or transport errors,
    /// [`RelayError::FileTooLarge`] once the body passes the byte cap and
    /// [`RelayError::Io`] if the file cannot be written.
    pub async fn download(&self, url: &Url, workdir: &Path) -> Result<Artifact, RelayError> {
        debug!(url = %url, "Fetching image");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::ExtractionFailed {
                reason: status_reason(status),
                detail: format!("HTTP {status} from {}", url.host_str().unwrap_or("source")),
            });
        }

        if let Some(declared) = response.content_length() {
            if declared > self.max_bytes {
                debug!(declared, limit = self.max_bytes, "Image rejected by Content-Length");
                return Err(RelayError::FileTooLarge {
                    size: declared,
                    limit: self.max_bytes,
                });
            }
        }

        let path = workdir.join(file_name_for(url));
        let mut file = tokio::fs::File::create(&path).await?;
        let mut size: u64 = 0;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(transport_error)?;
            size += chunk.len() as u64;
            if size > self.max_bytes {
                drop(file);
                tokio::fs::remove_file(&path).await?;
                debug!(size, limit = self.max_bytes, "Image download aborted at byte cap");
                return Err(RelayError::FileTooLarge {
                    size,
                    limit: self.max_bytes,
                });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        info!(url = %url, size, path = %path.display(), "Image downloaded");
        Ok(Artifact {
            path,
            size,
            kind: MediaKind::Image,
            title: None,
            uploader: None,
        })
    }
}

fn transport_error(e: reqwest::Error) -> RelayError {
    let reason = if e.is_timeout() {
        ExtractionFailure::Timeout
    } else {
        ExtractionFailure::Network
    };
    RelayError::ExtractionFailed {
        reason,
        detail: e.to_string(),
    }
}

fn status_reason(status: StatusCode) -> ExtractionFailure {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ExtractionFailure::AuthRequired,
        StatusCode::TOO_MANY_REQUESTS => ExtractionFailure::Network,
        s if s.is_server_error() => ExtractionFailure::Network,
        _ => ExtractionFailure::Unavailable,
    }
}

/// Local file name from the last path segment, restricted to safe characters
fn file_name_for(url: &Url) -> PathBuf {
    let raw = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();

    let sanitized: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let sanitized = sanitized.trim_start_matches('.');

    if sanitized.is_empty() || !sanitized.contains('.') {
        PathBuf::from(DEFAULT_IMAGE_NAME)
    } else {
        PathBuf::from(sanitized)
    }
}
