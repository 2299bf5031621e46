use anyhow::Result;
use async_trait::async_trait;
use oxide_media_relay::error::RelayError;
use oxide_media_relay::media::{Artifact, DownloadRequest, MediaFetcher, MediaKind};
use oxide_media_relay::relay::{
    ChatTransport, Outcome, RelayPipeline, RequestStage, StatusMessage,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Fetcher that writes a file of a fixed size, or fails with a fixed
/// extractor output.
struct FakeFetcher {
    size: usize,
    failure: Option<String>,
    requests: Mutex<Vec<DownloadRequest>>,
    written: Mutex<Vec<PathBuf>>,
}

impl FakeFetcher {
    fn writing(size: usize) -> Arc<Self> {
        Arc::new(Self {
            size,
            failure: None,
            requests: Mutex::new(Vec::new()),
            written: Mutex::new(Vec::new()),
        })
    }

    fn failing(output: &str) -> Arc<Self> {
        Arc::new(Self {
            size: 0,
            failure: Some(output.to_string()),
            requests: Mutex::new(Vec::new()),
            written: Mutex::new(Vec::new()),
        })
    }

    fn kinds(&self) -> Vec<MediaKind> {
        self.requests
            .lock()
            .expect("lock")
            .iter()
            .map(|r| r.kind)
            .collect()
    }

    fn written(&self) -> Vec<PathBuf> {
        self.written.lock().expect("lock").clone()
    }
}

#[async_trait]
impl MediaFetcher for FakeFetcher {
    async fn fetch(
        &self,
        request: &DownloadRequest,
        workdir: &Path,
    ) -> Result<Artifact, RelayError> {
        self.requests.lock().expect("lock").push(request.clone());
        if let Some(output) = &self.failure {
            return Err(RelayError::extraction(output.clone()));
        }

        let path = workdir.join(format!("clip.{}", extension(request.kind)));
        tokio::fs::write(&path, vec![0_u8; self.size]).await?;
        self.written.lock().expect("lock").push(path.clone());
        Ok(Artifact {
            path,
            size: self.size as u64,
            kind: request.kind,
            title: Some("Test clip".to_string()),
            uploader: None,
        })
    }
}

fn extension(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Image => "png",
        MediaKind::Audio => "mp3",
        MediaKind::Video => "mp4",
    }
}

#[derive(Default)]
struct RecordingTransport {
    texts: Mutex<Vec<String>>,
    uploads: Mutex<Vec<(MediaKind, bool)>>,
}

impl RecordingTransport {
    fn texts(&self) -> Vec<String> {
        self.texts.lock().expect("lock").clone()
    }

    fn uploads(&self) -> Vec<(MediaKind, bool)> {
        self.uploads.lock().expect("lock").clone()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_text(&self, _chat_id: i64, text: &str) -> Result<StatusMessage> {
        let mut texts = self.texts.lock().expect("lock");
        texts.push(text.to_string());
        Ok(StatusMessage(i32::try_from(texts.len()).unwrap_or(i32::MAX)))
    }

    async fn edit_text(&self, _chat_id: i64, _message: StatusMessage, _text: &str) -> Result<()> {
        Ok(())
    }

    async fn delete_message(&self, _chat_id: i64, _message: StatusMessage) -> Result<()> {
        Ok(())
    }

    async fn send_media(
        &self,
        _chat_id: i64,
        artifact: &Artifact,
        _caption: &str,
    ) -> Result<(), RelayError> {
        let exists = artifact.path.exists();
        self.uploads
            .lock()
            .expect("lock")
            .push((artifact.kind, exists));
        Ok(())
    }
}

fn pipeline(
    fetcher: Arc<FakeFetcher>,
    transport: Arc<RecordingTransport>,
    root: &Path,
    limit: u64,
) -> RelayPipeline {
    RelayPipeline::new(fetcher, transport, root.to_path_buf(), limit)
}

#[tokio::test]
async fn message_without_link_never_downloads() {
    let root = tempfile::tempdir().expect("tempdir");
    let fetcher = FakeFetcher::writing(16);
    let transport = Arc::new(RecordingTransport::default());
    let relay = pipeline(fetcher.clone(), transport.clone(), root.path(), 1024);

    let report = relay.handle(7, "hello there, no links today").await;

    assert_eq!(report.outcome, Outcome::NoLink);
    assert_eq!(
        report.stages,
        vec![RequestStage::Received, RequestStage::Cleaned]
    );
    assert!(fetcher.kinds().is_empty());
    assert!(transport.uploads().is_empty());
    assert!(transport.texts()[0].contains("valid link"));
}

#[tokio::test]
async fn delivered_file_is_removed_afterwards() {
    let root = tempfile::tempdir().expect("tempdir");
    let fetcher = FakeFetcher::writing(64);
    let transport = Arc::new(RecordingTransport::default());
    let relay = pipeline(fetcher.clone(), transport.clone(), root.path(), 1024);

    let report = relay
        .handle(7, "https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        .await;

    assert_eq!(report.outcome, Outcome::Delivered(MediaKind::Video));
    assert_eq!(report.stages.last(), Some(&RequestStage::Cleaned));
    assert_eq!(transport.uploads(), vec![(MediaKind::Video, true)]);
    for path in fetcher.written() {
        assert!(!path.exists(), "{} was left behind", path.display());
    }
    let leftovers = std::fs::read_dir(root.path()).expect("read root").count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn oversized_file_is_deleted_and_not_uploaded() {
    let root = tempfile::tempdir().expect("tempdir");
    let fetcher = FakeFetcher::writing(4096);
    let transport = Arc::new(RecordingTransport::default());
    let relay = pipeline(fetcher.clone(), transport.clone(), root.path(), 1024);

    let report = relay.handle(7, "https://vimeo.com/76979871").await;

    assert_eq!(report.outcome, Outcome::TooLarge);
    assert!(report.stages.contains(&RequestStage::TooLarge));
    assert!(transport.uploads().is_empty());
    assert!(transport.texts().iter().any(|t| t.contains("too large")));
    for path in fetcher.written() {
        assert!(!path.exists());
    }
}

#[tokio::test]
async fn audio_keyword_requests_audio() {
    let root = tempfile::tempdir().expect("tempdir");
    let fetcher = FakeFetcher::writing(32);
    let transport = Arc::new(RecordingTransport::default());
    let relay = pipeline(fetcher.clone(), transport.clone(), root.path(), 1024);

    let report = relay
        .handle(7, "mp3 https://www.youtube.com/watch?v=abc")
        .await;

    assert_eq!(report.outcome, Outcome::Delivered(MediaKind::Audio));
    assert_eq!(fetcher.kinds(), vec![MediaKind::Audio]);
}

#[tokio::test]
async fn image_link_is_sent_as_image() {
    let root = tempfile::tempdir().expect("tempdir");
    let fetcher = FakeFetcher::writing(32);
    let transport = Arc::new(RecordingTransport::default());
    let relay = pipeline(fetcher.clone(), transport.clone(), root.path(), 1024);

    let report = relay.handle(7, "https://example.com/cat.PNG?size=large").await;

    assert_eq!(report.outcome, Outcome::Delivered(MediaKind::Image));
    assert_eq!(transport.uploads(), vec![(MediaKind::Image, true)]);
}

#[tokio::test]
async fn sign_in_wall_asks_for_authentication() {
    let root = tempfile::tempdir().expect("tempdir");
    let fetcher =
        FakeFetcher::failing("ERROR: [youtube] abc: Sign in to confirm you're not a bot");
    let transport = Arc::new(RecordingTransport::default());
    let relay = pipeline(fetcher.clone(), transport.clone(), root.path(), 1024);

    let report = relay.handle(7, "https://www.youtube.com/watch?v=abc").await;

    assert_eq!(report.outcome, Outcome::FetchFailed);
    assert_eq!(fetcher.kinds(), vec![MediaKind::Video]);
    assert!(transport.uploads().is_empty());
    assert!(transport.texts().iter().any(|t| t.contains("authentication")));
}

#[tokio::test]
async fn generic_video_failure_falls_back_to_audio() {
    let root = tempfile::tempdir().expect("tempdir");
    let fetcher = FakeFetcher::failing("ERROR: Requested format is not available");
    let transport = Arc::new(RecordingTransport::default());
    let relay = pipeline(fetcher.clone(), transport.clone(), root.path(), 1024);

    let report = relay.handle(7, "https://www.tiktok.com/@user/video/1").await;

    assert_eq!(report.outcome, Outcome::FetchFailed);
    assert_eq!(fetcher.kinds(), vec![MediaKind::Video, MediaKind::Audio]);
    assert_eq!(report.stages.last(), Some(&RequestStage::Cleaned));
}

#[tokio::test]
async fn marker_word_in_link_does_not_trigger_auth_reply() {
    let root = tempfile::tempdir().expect("tempdir");
    let fetcher = FakeFetcher::failing(
        "ERROR: Unsupported URL: https://www.bakery.com/recipes/chocolate-cookies",
    );
    let transport = Arc::new(RecordingTransport::default());
    let relay = pipeline(fetcher.clone(), transport.clone(), root.path(), 1024);

    let report = relay
        .handle(7, "https://www.bakery.com/recipes/chocolate-cookies")
        .await;

    assert_eq!(report.outcome, Outcome::FetchFailed);
    assert_eq!(fetcher.kinds(), vec![MediaKind::Video, MediaKind::Audio]);
    let texts = transport.texts();
    assert!(texts.iter().all(|t| !t.contains("authentication")));
    assert!(texts.iter().any(|t| t.contains("not supported")));
}
