//! Configuration and settings management
//!
//! Loads settings from environment variables and config files and defines
//! the fixed limits the relay works with.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    #[serde(default)]
    pub telegram_token: String,

    /// Netscape cookie-jar contents passed to the extractor for sources
    /// that require a logged-in session
    pub ytdlp_cookies: Option<String>,

    /// Path to an existing cookie file, used when no inline cookies are set
    pub ytdlp_cookies_file: Option<String>,

    /// Extractor executable
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: String,

    /// Parent directory for per-request temporary directories
    pub download_dir: Option<String>,

    /// Upload ceiling in MiB
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,

    /// Timeout for direct image downloads
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Optional wall-clock cap on a single extractor run
    pub extraction_timeout_secs: Option<u64>,
}

fn default_ytdlp_path() -> String {
    "yt-dlp".to_string()
}

const fn default_max_upload_mb() -> u64 {
    DEFAULT_MAX_UPLOAD_MB
}

const fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

/// Build the layered configuration source.
///
/// # Errors
///
/// Returns a `ConfigError` if any source fails to load.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Local overrides, not checked into git
        .add_source(File::with_name("config/local").required(false))
        // Eg.. `APP__MAX_UPLOAD_MB=20 ./target/app`
        .add_source(Environment::with_prefix("APP").separator("__"))
        // UPPER_SNAKE_CASE variables map onto snake_case keys; empty means unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use oxide_media_relay::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or the bot token is missing.
    pub fn new() -> Result<Self, ConfigError> {
        let mut settings: Self = build_config()?.try_deserialize()?;

        if settings.telegram_token.trim().is_empty() {
            if let Ok(val) = std::env::var("TELEGRAM_TOKEN") {
                settings.telegram_token = val;
            }
        }
        if settings.ytdlp_cookies.is_none() {
            if let Ok(val) = std::env::var("YTDLP_COOKIES") {
                if !val.is_empty() {
                    settings.ytdlp_cookies = Some(val);
                }
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the bot cannot start with.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` describing the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram_token.trim().is_empty() {
            return Err(ConfigError::Message(
                "TELEGRAM_TOKEN is not set".to_string(),
            ));
        }
        if self.max_upload_mb == 0 {
            return Err(ConfigError::Message(
                "MAX_UPLOAD_MB must be greater than zero".to_string(),
            ));
        }
        if self.max_upload_mb > MAX_UPLOAD_MB_CAP {
            return Err(ConfigError::Message(format!(
                "MAX_UPLOAD_MB must not exceed {MAX_UPLOAD_MB_CAP}"
            )));
        }
        Ok(())
    }

    /// Upload ceiling in bytes
    #[must_use]
    pub const fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    /// Timeout applied to direct image downloads
    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Optional cap on a single extractor run
    #[must_use]
    pub fn extraction_timeout(&self) -> Option<Duration> {
        self.extraction_timeout_secs.map(Duration::from_secs)
    }

    /// Directory under which request workspaces are created.
    ///
    /// Defaults to a dedicated directory inside the OS temp dir, so the
    /// startup sweep never touches other programs' files.
    #[must_use]
    pub fn download_root(&self) -> PathBuf {
        self.download_dir
            .as_deref()
            .filter(|dir| !dir.trim().is_empty())
            .map_or_else(
                || std::env::temp_dir().join(DEFAULT_DOWNLOAD_SUBDIR),
                PathBuf::from,
            )
    }

    /// Inline cookie jar with escaped newlines expanded.
    ///
    /// Env files usually hold the jar on one line, so `\n` escapes are
    /// turned back into real line breaks.
    #[must_use]
    pub fn cookies_blob(&self) -> Option<String> {
        self.ytdlp_cookies
            .as_deref()
            .map(str::trim)
            .filter(|blob| !blob.is_empty())
            .map(|blob| blob.replace("\\n", "\n").replace("\\t", "\t"))
    }
}

/// Default upload ceiling: the 50 MiB Bot API limit minus a 2 MiB margin
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 48;
/// Largest accepted `MAX_UPLOAD_MB`: the 2000 MB ceiling of a local Bot API server
pub const MAX_UPLOAD_MB_CAP: u64 = 2000;
/// Subdirectory of the OS temp dir used when `DOWNLOAD_DIR` is unset
pub const DEFAULT_DOWNLOAD_SUBDIR: &str = "oxide-media-relay";
/// Default timeout for direct image downloads
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
/// Largest image sent with `sendPhoto`; bigger ones go out as documents
pub const TELEGRAM_PHOTO_LIMIT_BYTES: u64 = 10 * 1024 * 1024;

/// Browser-like user agent for direct image downloads
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// URL path extensions treated as direct image links
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];
/// Words in the message that ask for an audio track instead of a video
pub const AUDIO_KEYWORDS: &[&str] = &["audio", "mp3", "song", "music"];

/// Format preference for video downloads
pub const VIDEO_FORMAT: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";
/// Format preference for audio downloads
pub const AUDIO_FORMAT: &str = "bestaudio/best";
/// Bitrate of re-encoded mp3 files
pub const AUDIO_BITRATE: &str = "192K";

/// Maximum characters of a diagnostic echoed back to the chat
pub const ERROR_SNIPPET_CHARS: usize = 300;
/// Maximum characters of an upload caption
pub const CAPTION_MAX_CHARS: usize = 900;

// Telegram API retry policy
/// Initial backoff between Telegram API retries
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff between Telegram API retries
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;
/// Maximum number of Telegram API retries
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Settings {
        Settings {
            telegram_token: "dummy".to_string(),
            ytdlp_cookies: None,
            ytdlp_cookies_file: None,
            ytdlp_path: default_ytdlp_path(),
            download_dir: None,
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            extraction_timeout_secs: None,
        }
    }

    #[test]
    fn test_missing_token_is_rejected() {
        let mut settings = sample();
        settings.telegram_token = "   ".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_ceiling_is_rejected() {
        let mut settings = sample();
        settings.max_upload_mb = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_absurd_ceiling_is_rejected_without_overflow() {
        let mut settings = sample();
        settings.max_upload_mb = u64::MAX;
        assert!(settings.validate().is_err());
        assert_eq!(settings.max_upload_bytes(), u64::MAX);

        settings.max_upload_mb = MAX_UPLOAD_MB_CAP;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_max_upload_bytes() {
        let settings = sample();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.max_upload_bytes(), 48 * 1024 * 1024);
    }

    #[test]
    fn test_cookies_blob_expands_escapes() {
        let mut settings = sample();
        settings.ytdlp_cookies =
            Some("# Netscape HTTP Cookie File\\n.youtube.com\\tTRUE".to_string());
        assert_eq!(
            settings.cookies_blob().as_deref(),
            Some("# Netscape HTTP Cookie File\n.youtube.com\tTRUE")
        );

        settings.ytdlp_cookies = Some("  ".to_string());
        assert!(settings.cookies_blob().is_none());
    }

    #[test]
    fn test_download_root_falls_back_to_dedicated_temp_subdir() {
        let mut settings = sample();
        assert_eq!(
            settings.download_root(),
            std::env::temp_dir().join(DEFAULT_DOWNLOAD_SUBDIR)
        );

        settings.download_dir = Some("/var/tmp/relay".to_string());
        assert_eq!(settings.download_root(), PathBuf::from("/var/tmp/relay"));
    }
}
