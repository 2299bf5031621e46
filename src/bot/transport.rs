//! Telegram implementation of the relay's chat transport.

use super::resilient::{
    delete_message_resilient, edit_message_safe_resilient, send_message_resilient,
};
use crate::config::TELEGRAM_PHOTO_LIMIT_BYTES;
use crate::error::RelayError;
use crate::media::{Artifact, MediaKind};
use crate::relay::{ChatTransport, StatusMessage};
use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, MessageId, ParseMode};
use tracing::{debug, info};

/// Chat transport backed by the Telegram Bot API
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    /// Wrap a bot handle
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }

    async fn upload(
        &self,
        chat_id: ChatId,
        artifact: &Artifact,
        caption: &str,
    ) -> Result<(), teloxide::RequestError> {
        let input = InputFile::file(artifact.path.clone()).file_name(artifact.file_name());

        match artifact.kind {
            MediaKind::Video => {
                self.bot
                    .send_video(chat_id, input)
                    .caption(caption)
                    .parse_mode(ParseMode::Html)
                    .supports_streaming(true)
                    .await?;
            }
            MediaKind::Audio => {
                let mut req = self
                    .bot
                    .send_audio(chat_id, input)
                    .caption(caption)
                    .parse_mode(ParseMode::Html);
                if let Some(title) = &artifact.title {
                    req = req.title(title.clone());
                }
                if let Some(uploader) = &artifact.uploader {
                    req = req.performer(uploader.clone());
                }
                req.await?;
            }
            MediaKind::Image if artifact.size <= TELEGRAM_PHOTO_LIMIT_BYTES => {
                self.bot
                    .send_photo(chat_id, input)
                    .caption(caption)
                    .parse_mode(ParseMode::Html)
                    .await?;
            }
            MediaKind::Image => {
                debug!(size = artifact.size, "Image above photo limit, sending as document");
                self.bot
                    .send_document(chat_id, input)
                    .caption(caption)
                    .parse_mode(ParseMode::Html)
                    .await?;
            }
        }
        Ok(())
    }
}

const fn upload_action(kind: MediaKind) -> ChatAction {
    match kind {
        MediaKind::Video => ChatAction::UploadVideo,
        MediaKind::Audio => ChatAction::UploadVoice,
        MediaKind::Image => ChatAction::UploadPhoto,
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<StatusMessage> {
        let msg = send_message_resilient(&self.bot, ChatId(chat_id), text, None).await?;
        Ok(StatusMessage(msg.id.0))
    }

    async fn edit_text(&self, chat_id: i64, message: StatusMessage, text: &str) -> Result<()> {
        // Progress edits are best effort
        edit_message_safe_resilient(&self.bot, ChatId(chat_id), MessageId(message.0), text).await;
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message: StatusMessage) -> Result<()> {
        delete_message_resilient(&self.bot, ChatId(chat_id), MessageId(message.0)).await
    }

    async fn send_media(
        &self,
        chat_id: i64,
        artifact: &Artifact,
        caption: &str,
    ) -> Result<(), RelayError> {
        let chat = ChatId(chat_id);
        if let Err(e) = self
            .bot
            .send_chat_action(chat, upload_action(artifact.kind))
            .await
        {
            debug!(error = %e, "Failed to send chat action");
        }

        info!(
            kind = %artifact.kind,
            size = artifact.size,
            file = %artifact.file_name(),
            "Uploading artifact to Telegram"
        );
        self.upload(chat, artifact, caption)
            .await
            .map_err(|e| RelayError::DeliveryFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_action_matches_kind() {
        assert!(matches!(
            upload_action(MediaKind::Video),
            ChatAction::UploadVideo
        ));
        assert!(matches!(
            upload_action(MediaKind::Image),
            ChatAction::UploadPhoto
        ));
    }
}
