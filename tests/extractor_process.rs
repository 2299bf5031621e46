#![cfg(unix)]

use oxide_media_relay::error::{ExtractionFailure, RelayError};
use oxide_media_relay::media::ytdlp::CookieSource;
use oxide_media_relay::media::{DownloadRequest, MediaKind, YtdlpExtractor};
use reqwest::Url;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Stand-in for yt-dlp: refuses to work without `--cookies`, otherwise
/// writes a file next to the `-o` template and prints its info line.
const FAKE_EXTRACTOR: &str = r#"#!/bin/sh
out=""
cookies=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then out="$arg"; fi
  if [ "$prev" = "--cookies" ]; then cookies="$arg"; fi
  prev="$arg"
done
if [ -z "$cookies" ] || [ ! -s "$cookies" ]; then
  echo "WARNING: [youtube] falling back to anonymous session" >&2
  echo "ERROR: [youtube] abc: Sign in to confirm your age" >&2
  exit 1
fi
dir=$(dirname "$out")
printf 'fake media payload' > "$dir/abc.mp4"
echo "{\"filepath\": \"$dir/abc.mp4\", \"title\": \"Fake clip\", \"uploader\": \"NA\"}"
"#;

fn install_fake(dir: &Path) -> PathBuf {
    let path = dir.join("fake-yt-dlp");
    std::fs::write(&path, FAKE_EXTRACTOR).expect("write script");
    let mut perms = std::fs::metadata(&path).expect("metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod");
    path
}

fn request() -> DownloadRequest {
    let url = Url::parse("https://www.youtube.com/watch?v=abc").expect("url");
    DownloadRequest::new(url, MediaKind::Video)
}

// One test drives the script in sequence; spawning a freshly written
// executable from parallel test threads can fail with ETXTBSY.
#[tokio::test]
async fn fake_extractor_runs_end_to_end() {
    let bin_dir = tempfile::tempdir().expect("tempdir");
    let script = install_fake(bin_dir.path());
    let binary = script.to_string_lossy().into_owned();

    // Anonymous run hits the sign-in wall
    let workdir = tempfile::tempdir().expect("tempdir");
    let anonymous = YtdlpExtractor::new(binary.clone());
    let err = anonymous
        .download(&request(), workdir.path())
        .await
        .expect_err("anonymous download must fail");
    assert!(err.is_auth_required(), "unexpected error: {err:?}");
    let RelayError::ExtractionFailed { detail, .. } = &err else {
        panic!("expected extraction failure, got {err:?}");
    };
    assert!(detail.starts_with("ERROR:"), "detail: {detail}");

    // With cookies the file comes back with metadata
    let workdir = tempfile::tempdir().expect("tempdir");
    let authed = YtdlpExtractor::new(binary)
        .with_cookies(CookieSource::Inline("# Netscape HTTP Cookie File\n".to_string()));
    let artifact = authed
        .download(&request(), workdir.path())
        .await
        .expect("download with cookies");
    assert_eq!(artifact.kind, MediaKind::Video);
    assert_eq!(artifact.file_name(), "abc.mp4");
    assert_eq!(artifact.size, "fake media payload".len() as u64);
    assert_eq!(artifact.title.as_deref(), Some("Fake clip"));
    assert_eq!(artifact.uploader, None);
}

#[tokio::test]
async fn missing_extractor_binary_is_reported() {
    let workdir = tempfile::tempdir().expect("tempdir");
    let extractor = YtdlpExtractor::new("/nonexistent/definitely-not-yt-dlp");

    let err = extractor
        .download(&request(), workdir.path())
        .await
        .expect_err("missing binary must fail");

    match err {
        RelayError::ExtractionFailed { reason, detail } => {
            assert_eq!(reason, ExtractionFailure::Other);
            assert!(detail.contains("not found"), "detail: {detail}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
