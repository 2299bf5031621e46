//! Media acquisition
//!
//! Turns a link into a file on disk: pick the link out of the message,
//! decide what kind of media it points to, download it into a per-request
//! workspace and check it against the upload ceiling.

/// Media kind detection from URL and message text
pub mod classify;
/// Size ceiling check
pub mod gate;
/// Direct image downloads over HTTP
pub mod image;
/// Link extraction from free-form text
pub mod link;
/// Per-request temporary directories
pub mod workspace;
/// Audio/video extraction through yt-dlp
pub mod ytdlp;

use crate::config::Settings;
use crate::error::RelayError;
use async_trait::async_trait;
use reqwest::Url;
use std::fmt;
use std::path::{Path, PathBuf};

pub use classify::classify;
pub use gate::check_size;
pub use image::ImageDownloader;
pub use link::extract_first_url;
pub use workspace::{empty_workspace, sweep_stale_workspaces, RequestWorkspace};
pub use ytdlp::YtdlpExtractor;

/// What the user wants back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// A still image fetched directly
    Image,
    /// An audio track, re-encoded to mp3
    Audio,
    /// A video, preferably mp4
    Video,
}

impl MediaKind {
    /// Kind to retry with when a download of this kind fails.
    ///
    /// Only video falls back (to audio-only); everything else is final.
    #[must_use]
    pub const fn fallback(self) -> Option<Self> {
        match self {
            Self::Video => Some(Self::Audio),
            Self::Image | Self::Audio => None,
        }
    }

    /// Emoji used in progress and completion messages
    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::Image => "🖼",
            Self::Audio => "🎵",
            Self::Video => "🎬",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
        };
        f.write_str(label)
    }
}

/// A link plus the kind of media requested for it.
///
/// Lives for one message-handling cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Source link
    pub url: Url,
    /// Requested media kind
    pub kind: MediaKind,
}

impl DownloadRequest {
    /// Create a request for `url` with the given kind
    #[must_use]
    pub const fn new(url: Url, kind: MediaKind) -> Self {
        Self { url, kind }
    }

    /// Same link, different kind
    #[must_use]
    pub fn with_kind(&self, kind: MediaKind) -> Self {
        Self {
            url: self.url.clone(),
            kind,
        }
    }
}

/// A downloaded file waiting for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Location inside the request workspace
    pub path: PathBuf,
    /// Size in bytes at the time of download
    pub size: u64,
    /// Kind actually downloaded (may differ from the request after a fallback)
    pub kind: MediaKind,
    /// Title reported by the extractor
    pub title: Option<String>,
    /// Uploader reported by the extractor
    pub uploader: Option<String>,
}

impl Artifact {
    /// File name used for the upload
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| "file".to_string(), |n| n.to_string_lossy().to_string())
    }
}

/// Anything that can materialize a [`DownloadRequest`] on disk
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Download the requested media into `workdir`.
    async fn fetch(
        &self,
        request: &DownloadRequest,
        workdir: &Path,
    ) -> Result<Artifact, RelayError>;
}

/// Production fetcher: images over HTTP, everything else through yt-dlp
pub struct Fetcher {
    images: ImageDownloader,
    extractor: YtdlpExtractor,
}

impl Fetcher {
    /// Build both download paths from the startup settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        Ok(Self {
            images: ImageDownloader::new(settings.http_timeout())?
                .with_max_bytes(settings.max_upload_bytes()),
            extractor: YtdlpExtractor::from_settings(settings),
        })
    }
}

#[async_trait]
impl MediaFetcher for Fetcher {
    async fn fetch(
        &self,
        request: &DownloadRequest,
        workdir: &Path,
    ) -> Result<Artifact, RelayError> {
        match request.kind {
            MediaKind::Image => self.images.download(&request.url, workdir).await,
            MediaKind::Audio | MediaKind::Video => self.extractor.download(request, workdir).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_video_falls_back() {
        assert_eq!(MediaKind::Video.fallback(), Some(MediaKind::Audio));
        assert_eq!(MediaKind::Audio.fallback(), None);
        assert_eq!(MediaKind::Image.fallback(), None);
    }

    #[test]
    fn test_artifact_file_name() {
        let artifact = Artifact {
            path: PathBuf::from("/tmp/oxide-relay-x/clip.mp4"),
            size: 10,
            kind: MediaKind::Video,
            title: None,
            uploader: None,
        };
        assert_eq!(artifact.file_name(), "clip.mp4");
    }

    #[test]
    fn test_with_kind_keeps_url() -> Result<(), Box<dyn std::error::Error>> {
        let request = DownloadRequest::new(Url::parse("https://youtu.be/abc")?, MediaKind::Video);
        let audio = request.with_kind(MediaKind::Audio);
        assert_eq!(audio.url, request.url);
        assert_eq!(audio.kind, MediaKind::Audio);
        Ok(())
    }
}
