//! YT-DLP extractor - audio and video downloads via the yt-dlp executable
//!
//! The extractor runs as a child process with an argument vector (no
//! shell), writes into the request workspace and reports the final file
//! path plus metadata through `--print after_move:`.

use super::{Artifact, DownloadRequest, MediaKind};
use crate::config::{Settings, AUDIO_BITRATE, AUDIO_FORMAT, VIDEO_FORMAT};
use crate::error::{ExtractionFailure, RelayError};
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Name of the cookie jar written into the workspace
const COOKIE_FILE_NAME: &str = "cookies.txt";

/// Output template, relative to the workspace
const OUTPUT_TEMPLATE: &str = "%(id).80s.%(ext)s";

/// JSON printed by yt-dlp once the final file is in place
const PRINT_TEMPLATE: &str = "after_move:%(.{filepath,title,uploader})j";

/// Extensions of intermediate files yt-dlp may leave behind
const INTERMEDIATE_EXTENSIONS: &[&str] = &["part", "ytdl", "json", "tmp"];

/// Where the extractor gets session cookies from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CookieSource {
    /// Anonymous extraction
    #[default]
    None,
    /// Netscape cookie-jar contents, written to the workspace per request
    Inline(String),
    /// Existing cookie file on disk
    File(PathBuf),
}

/// Metadata printed by yt-dlp after the download
#[derive(Debug, Default, Deserialize)]
struct PrintedInfo {
    #[serde(default)]
    filepath: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
}

/// Media extraction through yt-dlp
#[derive(Debug, Clone)]
pub struct YtdlpExtractor {
    binary: String,
    cookies: CookieSource,
    timeout: Option<Duration>,
}

impl YtdlpExtractor {
    /// Extractor using `binary`, anonymous, without a time limit
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            cookies: CookieSource::None,
            timeout: None,
        }
    }

    /// Use session cookies for every download
    #[must_use]
    pub fn with_cookies(mut self, cookies: CookieSource) -> Self {
        self.cookies = cookies;
        self
    }

    /// Kill the extractor if a download runs longer than `timeout`
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the extractor from startup settings.
    ///
    /// Inline cookies take precedence over a cookie file path.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        let cookies = match (settings.cookies_blob(), settings.ytdlp_cookies_file.as_deref()) {
            (Some(blob), _) => CookieSource::Inline(blob),
            (None, Some(path)) if !path.trim().is_empty() => {
                CookieSource::File(PathBuf::from(path))
            }
            _ => CookieSource::None,
        };

        Self::new(settings.ytdlp_path.clone())
            .with_cookies(cookies)
            .with_timeout(settings.extraction_timeout())
    }

    /// Command-line arguments for one download.
    #[must_use]
    pub fn build_args(
        &self,
        request: &DownloadRequest,
        workdir: &Path,
        cookie_file: Option<&Path>,
    ) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--no-playlist".into(),
            "--no-progress".into(),
            "--no-warnings".into(),
            "--restrict-filenames".into(),
            "-o".into(),
            workdir.join(OUTPUT_TEMPLATE).to_string_lossy().into_owned(),
            "--print".into(),
            PRINT_TEMPLATE.into(),
        ];

        match request.kind {
            MediaKind::Audio => args.extend(
                [
                    "-f",
                    AUDIO_FORMAT,
                    "-x",
                    "--audio-format",
                    "mp3",
                    "--audio-quality",
                    AUDIO_BITRATE,
                ]
                .map(String::from),
            ),
            MediaKind::Video | MediaKind::Image => args.extend(
                ["-f", VIDEO_FORMAT, "--merge-output-format", "mp4"].map(String::from),
            ),
        }

        if let Some(path) = cookie_file {
            args.push("--cookies".into());
            args.push(path.to_string_lossy().into_owned());
        }

        args.push("--".into());
        args.push(request.url.to_string());
        args
    }

    /// Resolve the cookie file for this request, writing inline cookies
    /// into the workspace.
    async fn prepare_cookies(&self, workdir: &Path) -> io::Result<Option<PathBuf>> {
        match &self.cookies {
            CookieSource::None => Ok(None),
            CookieSource::File(path) => Ok(Some(path.clone())),
            CookieSource::Inline(blob) => {
                let path = workdir.join(COOKIE_FILE_NAME);
                let mut contents = blob.clone();
                if !contents.ends_with('\n') {
                    contents.push('\n');
                }
                tokio::fs::write(&path, contents).await?;
                Ok(Some(path))
            }
        }
    }

    async fn run(&self, args: &[String]) -> Result<Output, RelayError> {
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = command.output();
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, output).await.map_err(|_| {
                warn!(timeout_secs = limit.as_secs(), "yt-dlp timed out");
                RelayError::ExtractionFailed {
                    reason: ExtractionFailure::Timeout,
                    detail: format!("yt-dlp did not finish within {}s", limit.as_secs()),
                }
            })?,
            None => output.await,
        };

        result.map_err(|e| {
            let detail = if e.kind() == io::ErrorKind::NotFound {
                format!("yt-dlp executable not found: {}", self.binary)
            } else {
                format!("failed to start yt-dlp: {e}")
            };
            RelayError::ExtractionFailed {
                reason: ExtractionFailure::Other,
                detail,
            }
        })
    }

    /// Download `request` into `workdir`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::ExtractionFailed`] if yt-dlp cannot be started,
    /// exits with an error or leaves no file behind.
    pub async fn download(
        &self,
        request: &DownloadRequest,
        workdir: &Path,
    ) -> Result<Artifact, RelayError> {
        let cookie_file = self.prepare_cookies(workdir).await?;
        let args = self.build_args(request, workdir, cookie_file.as_deref());
        debug!(url = %request.url, kind = %request.kind, "Executing yt-dlp");

        let output = self.run(&args).await?;
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            let detail = error_detail(&stderr, &output.status.to_string());
            let reason = ExtractionFailure::from_output(&stderr);
            warn!(url = %request.url, %reason, error = %detail, "yt-dlp failed");
            return Err(RelayError::ExtractionFailed { reason, detail });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let printed = parse_printed_info(&stdout).unwrap_or_default();

        let path = match printed.filepath.as_deref().map(PathBuf::from) {
            Some(path) if path.is_file() => path,
            _ => locate_output(workdir).await?.ok_or_else(|| {
                RelayError::ExtractionFailed {
                    reason: ExtractionFailure::Other,
                    detail: "yt-dlp finished but produced no file".to_string(),
                }
            })?,
        };
        let size = tokio::fs::metadata(&path).await?.len();

        info!(
            url = %request.url,
            kind = %request.kind,
            size,
            path = %path.display(),
            "yt-dlp download finished"
        );

        Ok(Artifact {
            path,
            size,
            kind: request.kind,
            title: non_empty(printed.title),
            uploader: non_empty(printed.uploader),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty() && v != "NA")
}

/// Last JSON object printed on stdout
fn parse_printed_info(stdout: &str) -> Option<PrintedInfo> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .find_map(|line| serde_json::from_str(line).ok())
}

/// Most useful line of a failed run: the last `ERROR:` line, otherwise the
/// last non-empty line, otherwise the exit status.
fn error_detail(stderr: &str, status: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| lines.last())
        .map_or_else(
            || format!("yt-dlp exited with {status}"),
            |l| (*l).to_string(),
        )
}

/// Largest finished media file in the workspace
async fn locate_output(workdir: &Path) -> io::Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(workdir).await?;
    let mut best: Option<(u64, PathBuf)> = None;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let metadata = entry.metadata().await?;
        if !metadata.is_file() || is_auxiliary(&path) {
            continue;
        }
        if best.as_ref().is_none_or(|(size, _)| metadata.len() > *size) {
            best = Some((metadata.len(), path));
        }
    }

    Ok(best.map(|(_, path)| path))
}

fn is_auxiliary(path: &Path) -> bool {
    if path.file_name().is_some_and(|n| n == COOKIE_FILE_NAME) {
        return true;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| INTERMEDIATE_EXTENSIONS.contains(&ext))
}
