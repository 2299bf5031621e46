use crate::config::{Settings, AUDIO_KEYWORDS};
use crate::relay::RelayPipeline;
use crate::utils::format_megabytes;
use anyhow::Result;
use std::sync::Arc;
use teloxide::{prelude::*, utils::command::BotCommands};
use tracing::info;

// Helper function to get user name from Message
fn get_user_name(msg: &Message) -> String {
    if let Some(ref user) = msg.from {
        if let Some(ref username) = user.username {
            return username.clone();
        }
        if !user.first_name.is_empty() {
            return user.first_name.clone();
        }
    }
    "Unknown".to_string()
}

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Supported commands for the bot
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Start the bot and show welcome message
    #[command(description = "Start the bot.")]
    Start,
    /// Show usage help
    #[command(description = "How to use the bot.")]
    Help,
}

/// Usage text shown by `/start` and `/help`
///
/// # Examples
///
/// ```
/// use oxide_media_relay::bot::handlers::usage_text;
/// let text = usage_text(48 * 1024 * 1024);
/// assert!(text.contains("48.0 MB"));
/// ```
#[must_use]
pub fn usage_text(max_upload_bytes: u64) -> String {
    format!(
        "👋 Send me a link to a video (YouTube, Instagram, TikTok, Facebook and many more) \
         and I will download it and send it back.\n\n\
         🎵 Want only the sound? Add one of these words to your message: {}.\n\
         🖼 Direct image links (.jpg, .png, ...) are sent as pictures.\n\n\
         Files are limited to {}; short clips work best.",
        AUDIO_KEYWORDS.join(", "),
        format_megabytes(max_upload_bytes)
    )
}

/// Start and help handler
///
/// # Errors
///
/// Returns an error if the welcome message cannot be sent.
pub async fn start(bot: Bot, msg: Message, settings: Arc<Settings>) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    let user_name = get_user_name(&msg);

    info!("User {user_id} ({user_name}) initiated /start command.");

    bot.send_message(msg.chat.id, usage_text(settings.max_upload_bytes()))
        .await?;
    Ok(())
}

/// Text message handler: relays the first link in the message.
///
/// Failures are reported to the chat by the pipeline itself.
///
/// # Errors
///
/// Never fails; the `Result` keeps the endpoint signature uniform.
pub async fn handle_text(msg: Message, pipeline: Arc<RelayPipeline>) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    let text = msg.text().or_else(|| msg.caption()).unwrap_or_default();

    info!(user_id, chat_id = msg.chat.id.0, "Received message");
    let report = pipeline.handle(msg.chat.id.0, text).await;
    info!(user_id, outcome = ?report.outcome, "Message handled");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_mentions_keywords_and_limit() {
        let text = usage_text(48 * 1024 * 1024);
        for keyword in AUDIO_KEYWORDS {
            assert!(text.contains(keyword));
        }
        assert!(text.contains("48.0 MB"));
    }

    #[test]
    fn test_command_parsing() {
        assert!(matches!(
            Command::parse("/start", "oxide_bot"),
            Ok(Command::Start)
        ));
        assert!(matches!(Command::parse("/help", "oxide_bot"), Ok(Command::Help)));
        assert!(Command::parse("https://youtu.be/abc", "oxide_bot").is_err());
    }
}
