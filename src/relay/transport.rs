//! Chat transport seam used by the relay pipeline.
//!
//! The pipeline only needs four operations from the chat platform; the
//! Telegram implementation lives in [`crate::bot::transport`].

use crate::error::RelayError;
use crate::media::Artifact;
use anyhow::Result;
use async_trait::async_trait;

/// Identifier of a message the bot sent (used for progress edits)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusMessage(pub i32);

/// Outgoing operations on the chat platform
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a plain text message
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<StatusMessage>;

    /// Replace the text of a previously sent message
    async fn edit_text(&self, chat_id: i64, message: StatusMessage, text: &str) -> Result<()>;

    /// Delete a previously sent message
    async fn delete_message(&self, chat_id: i64, message: StatusMessage) -> Result<()>;

    /// Upload the artifact with a caption.
    ///
    /// Fails with [`RelayError::DeliveryFailed`] when the platform rejects
    /// the upload.
    async fn send_media(
        &self,
        chat_id: i64,
        artifact: &Artifact,
        caption: &str,
    ) -> Result<(), RelayError>;
}
