//! Relay pipeline
//!
//! One incoming message goes through five steps: extract the link,
//! classify it, fetch the media, check the size ceiling and deliver the
//! file. Every failure is turned into a chat reply here; nothing
//! propagates past [`RelayPipeline::handle`].

/// Per-request state machine
pub mod stage;
/// Chat transport seam
pub mod transport;

pub use stage::{RequestStage, StageTrail};
pub use transport::{ChatTransport, StatusMessage};

use crate::config::CAPTION_MAX_CHARS;
use crate::error::RelayError;
use crate::media::{
    check_size, classify, empty_workspace, extract_first_url, Artifact, DownloadRequest,
    MediaFetcher, MediaKind, RequestWorkspace,
};
use crate::utils::truncate_str;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// How a message-handling cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The message had no link
    NoLink,
    /// The link did not parse
    InvalidLink,
    /// The file was uploaded
    Delivered(MediaKind),
    /// The file exceeded the upload ceiling
    TooLarge,
    /// Nothing could be downloaded
    FetchFailed,
    /// The upload was rejected
    SendFailed,
}

/// Outcome plus the stages the request went through
#[derive(Debug, Clone)]
pub struct RelayReport {
    /// Final outcome
    pub outcome: Outcome,
    /// Stage trail, always ending in [`RequestStage::Cleaned`]
    pub stages: Vec<RequestStage>,
}

/// Process-scoped context that handles one message at a time per call
pub struct RelayPipeline {
    fetcher: Arc<dyn MediaFetcher>,
    transport: Arc<dyn ChatTransport>,
    download_root: PathBuf,
    max_upload_bytes: u64,
}

impl RelayPipeline {
    /// Create a pipeline.
    ///
    /// `download_root` is the parent of per-request workspaces and
    /// `max_upload_bytes` the size ceiling.
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        transport: Arc<dyn ChatTransport>,
        download_root: PathBuf,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            fetcher,
            transport,
            download_root,
            max_upload_bytes,
        }
    }

    /// Size ceiling in bytes
    #[must_use]
    pub const fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// Handle one incoming text message from `chat_id`.
    pub async fn handle(&self, chat_id: i64, text: &str) -> RelayReport {
        let request_id = Uuid::new_v4();
        let span = info_span!("relay", %request_id, chat_id);
        self.run(chat_id, text).instrument(span).await
    }

    async fn run(&self, chat_id: i64, text: &str) -> RelayReport {
        let mut trail = StageTrail::new();

        let url = match extract_first_url(text) {
            Ok(url) => url,
            Err(e) => {
                info!(error = %e, "No usable link in message");
                self.reply(chat_id, &e.user_message()).await;
                trail.advance(RequestStage::Cleaned);
                let outcome = match e {
                    RelayError::InvalidUrl(_) => Outcome::InvalidLink,
                    _ => Outcome::NoLink,
                };
                return finish(outcome, trail);
            }
        };

        let kind = classify(&url, text);
        let request = DownloadRequest::new(url, kind);
        trail.advance(RequestStage::Classified);
        info!(url = %request.url, %kind, "Relay request classified");

        let progress = self
            .transport
            .send_text(
                chat_id,
                &format!("{} Downloading {kind}, this can take a minute...", kind.icon()),
            )
            .await
            .map_err(|e| warn!(error = %e, "Failed to send progress message"))
            .ok();

        let outcome = match RequestWorkspace::create(&self.download_root) {
            Ok(workspace) => {
                let outcome = self
                    .fetch_and_deliver(chat_id, &request, workspace.path(), progress, &mut trail)
                    .await;
                workspace.cleanup();
                outcome
            }
            Err(e) => {
                error!(error = %e, root = %self.download_root.display(), "Failed to create workspace");
                trail.advance(RequestStage::Fetching);
                trail.advance(RequestStage::FetchFailed);
                self.reply(chat_id, &RelayError::Io(e).user_message()).await;
                Outcome::FetchFailed
            }
        };

        if let Some(message) = progress {
            if let Err(e) = self.transport.delete_message(chat_id, message).await {
                warn!(error = %e, "Failed to delete progress message");
            }
        }

        trail.advance(RequestStage::Cleaned);
        info!(?outcome, "Relay request finished");
        finish(outcome, trail)
    }

    async fn fetch_and_deliver(
        &self,
        chat_id: i64,
        request: &DownloadRequest,
        workdir: &Path,
        progress: Option<StatusMessage>,
        trail: &mut StageTrail,
    ) -> Outcome {
        trail.advance(RequestStage::Fetching);
        let artifact = match self.fetch_with_fallback(chat_id, request, workdir, progress).await {
            Ok(artifact) => artifact,
            Err(e) => {
                trail.advance(RequestStage::FetchFailed);
                self.reply(chat_id, &e.user_message()).await;
                // Downloads cut off at the byte cap never reach the gate
                return if matches!(e, RelayError::FileTooLarge { .. }) {
                    Outcome::TooLarge
                } else {
                    Outcome::FetchFailed
                };
            }
        };
        trail.advance(RequestStage::Fetched);

        if let Err(e) = check_size(&artifact, self.max_upload_bytes).await {
            trail.advance(RequestStage::TooLarge);
            self.reply(chat_id, &e.user_message()).await;
            return Outcome::TooLarge;
        }

        if let Some(message) = progress {
            let text = format!("📤 Uploading {}...", artifact.kind);
            if let Err(e) = self.transport.edit_text(chat_id, message, &text).await {
                warn!(error = %e, "Failed to update progress message");
            }
        }

        let caption = build_caption(&artifact);
        match self.transport.send_media(chat_id, &artifact, &caption).await {
            Ok(()) => {
                trail.advance(RequestStage::Sent);
                info!(kind = %artifact.kind, size = artifact.size, "Artifact delivered");
                self.reply(chat_id, "✅ Done! Send another link any time.").await;
                Outcome::Delivered(artifact.kind)
            }
            Err(e) => {
                trail.advance(RequestStage::SendFailed);
                warn!(error = %e, "Artifact delivery failed");
                self.reply(chat_id, &e.user_message()).await;
                Outcome::SendFailed
            }
        }
    }

    /// Fetch the request; a failed video download is retried once as audio.
    ///
    /// No fallback for sign-in walls: the audio stream sits behind the
    /// same wall.
    async fn fetch_with_fallback(
        &self,
        chat_id: i64,
        request: &DownloadRequest,
        workdir: &Path,
        progress: Option<StatusMessage>,
    ) -> Result<Artifact, RelayError> {
        let err = match self.fetcher.fetch(request, workdir).await {
            Ok(artifact) => return Ok(artifact),
            Err(e) => e,
        };

        let Some(fallback) = request.kind.fallback() else {
            return Err(err);
        };
        if err.is_auth_required() {
            return Err(err);
        }

        warn!(error = %err, %fallback, "Download failed, retrying with fallback kind");
        // Leftovers of the failed attempt must not be picked up as the artifact
        if let Err(e) = empty_workspace(workdir).await {
            error!(
                error = %e,
                path = %workdir.display(),
                "Failed to empty workspace before fallback"
            );
            return Err(err);
        }
        if let Some(message) = progress {
            let text = format!(
                "{} {} not available, trying {fallback} only...",
                fallback.icon(),
                capitalize(&request.kind.to_string())
            );
            if let Err(e) = self.transport.edit_text(chat_id, message, &text).await {
                warn!(error = %e, "Failed to update progress message");
            }
        }

        match self.fetcher.fetch(&request.with_kind(fallback), workdir).await {
            Ok(artifact) => Ok(artifact),
            Err(fallback_err) => {
                warn!(error = %fallback_err, "Fallback download failed too");
                // An auth hint is more useful than the original generic failure
                if fallback_err.is_auth_required() {
                    Err(fallback_err)
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.transport.send_text(chat_id, text).await {
            error!(error = %e, "Failed to send reply");
        }
    }
}

fn finish(outcome: Outcome, trail: StageTrail) -> RelayReport {
    RelayReport {
        outcome,
        stages: trail.into_stages(),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// HTML caption for the upload: title and uploader when known.
#[must_use]
pub fn build_caption(artifact: &Artifact) -> String {
    let icon = artifact.kind.icon();
    let title = artifact
        .title
        .as_deref()
        .map(|t| truncate_str(t, CAPTION_MAX_CHARS));

    match (title, artifact.uploader.as_deref()) {
        (Some(title), Some(uploader)) => format!(
            "{icon} <b>{}</b>\n👤 {}",
            html_escape::encode_text(&title),
            html_escape::encode_text(&truncate_str(uploader, 100))
        ),
        (Some(title), None) => format!("{icon} <b>{}</b>", html_escape::encode_text(&title)),
        (None, _) => format!("{icon} Here is your {}", artifact.kind),
    }
}
