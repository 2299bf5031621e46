//! Error taxonomy for the relay pipeline.
//!
//! Every failure in a message-handling cycle ends up as a [`RelayError`]
//! and is rendered into a chat reply at the handler boundary.

// lazy_regex! validates the pattern at compile time and initializes it on first use
#![allow(clippy::non_std_lazy_statics)]

use crate::config::ERROR_SNIPPET_CHARS;
use crate::utils::{format_megabytes, truncate_str};
use lazy_regex::lazy_regex;
use std::fmt;
use thiserror::Error;

/// URLs echoed back by the extractor; their paths must not trigger markers
static RE_ECHOED_URL: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"(?i)https?://\S+");

/// Why the extractor (or a direct download) could not produce a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionFailure {
    /// The source wants a logged-in session (sign-in wall, age gate, private post)
    AuthRequired,
    /// The extractor does not know the site
    Unsupported,
    /// The media was removed, blocked or never existed
    Unavailable,
    /// Connection-level problem reaching the source
    Network,
    /// The download did not finish in time
    Timeout,
    /// Anything the markers below do not recognise
    Other,
}

/// Markers for sources that need cookies. Checked first.
const AUTH_MARKERS: &[&str] = &[
    "sign in",
    "login required",
    "requested content is not available, rate-limit reached or login required",
    "--cookies",
    "cookies are no longer valid",
    "private video",
    "this video is private",
    "members-only",
    "join this channel to get access",
    "age-restricted",
    "confirm your age",
    "http error 401",
];

const UNSUPPORTED_MARKERS: &[&str] = &[
    "unsupported url",
    "is not a valid url",
    "no video formats found",
];

const UNAVAILABLE_MARKERS: &[&str] = &[
    "video unavailable",
    "this video is not available",
    "removed by the uploader",
    "no longer available",
    "blocked it in your country",
    "geo-restricted",
    "copyright",
    "terminated account",
    "this video has been removed",
    "premieres in",
    "this live event will begin",
    "http error 403",
    "http error 404",
    "unable to extract",
];

const NETWORK_MARKERS: &[&str] = &[
    "connection reset",
    "connection timed out",
    "unable to download webpage",
    "http error 429",
    "http error 503",
    "read timed out",
    "network is unreachable",
    "temporary failure in name resolution",
];

impl ExtractionFailure {
    /// Classify extractor output by well-known error markers.
    ///
    /// Matching is case-insensitive and ignores URLs quoted in the output.
    /// Authentication markers win over the others because a sign-in wall
    /// is often reported together with a generic "unavailable" line.
    ///
    /// # Examples
    ///
    /// ```
    /// use oxide_media_relay::error::ExtractionFailure;
    /// let reason = ExtractionFailure::from_output("ERROR: Sign in to confirm you're not a bot");
    /// assert_eq!(reason, ExtractionFailure::AuthRequired);
    /// ```
    #[must_use]
    pub fn from_output(output: &str) -> Self {
        let lowered = RE_ECHOED_URL.replace_all(output, "").to_lowercase();
        let matches = |markers: &[&str]| markers.iter().any(|m| lowered.contains(m));

        if matches(AUTH_MARKERS) {
            Self::AuthRequired
        } else if matches(UNSUPPORTED_MARKERS) {
            Self::Unsupported
        } else if matches(UNAVAILABLE_MARKERS) {
            Self::Unavailable
        } else if matches(NETWORK_MARKERS) {
            Self::Network
        } else {
            Self::Other
        }
    }
}

impl fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::AuthRequired => "authentication required",
            Self::Unsupported => "unsupported source",
            Self::Unavailable => "media unavailable",
            Self::Network => "network error",
            Self::Timeout => "timed out",
            Self::Other => "extraction error",
        };
        f.write_str(label)
    }
}

/// Errors that can occur while relaying a link
#[derive(Debug, Error)]
pub enum RelayError {
    /// The message contains no `http(s)://` link
    #[error("no URL found in message")]
    NoUrlFound,
    /// A link-shaped token that does not parse as a URL
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    /// The extractor or direct download failed
    #[error("extraction failed ({reason}): {detail}")]
    ExtractionFailed {
        /// Classified cause
        reason: ExtractionFailure,
        /// Raw diagnostic from the extractor or HTTP client
        detail: String,
    },
    /// The downloaded file exceeds the upload ceiling
    #[error("file too large: {size} bytes (limit {limit})")]
    FileTooLarge {
        /// Size of the artifact on disk
        size: u64,
        /// Configured ceiling
        limit: u64,
    },
    /// The chat transport rejected the upload
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),
    /// Local filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Shorthand for an extraction failure classified from its own text.
    #[must_use]
    pub fn extraction(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self::ExtractionFailed {
            reason: ExtractionFailure::from_output(&detail),
            detail,
        }
    }

    /// Whether the failure comes from a sign-in wall on the source.
    #[must_use]
    pub const fn is_auth_required(&self) -> bool {
        matches!(
            self,
            Self::ExtractionFailed {
                reason: ExtractionFailure::AuthRequired,
                ..
            }
        )
    }

    /// Render the reply shown to the chat.
    ///
    /// Diagnostics are truncated so a noisy extractor log never floods
    /// the conversation.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NoUrlFound => {
                "❌ Send a valid link (it should start with http:// or https://).".to_string()
            }
            Self::InvalidUrl(url) => format!(
                "❌ This link does not look valid: {}",
                truncate_str(url, ERROR_SNIPPET_CHARS)
            ),
            Self::ExtractionFailed {
                reason: ExtractionFailure::AuthRequired,
                detail,
            } => format!(
                "🔒 This source requires authentication (sign-in, age check or private content). \
                 The bot needs valid cookies for it.\n\nDetails: {}",
                truncate_str(detail, ERROR_SNIPPET_CHARS)
            ),
            Self::ExtractionFailed {
                reason: ExtractionFailure::Unsupported,
                detail,
            } => format!(
                "❌ This platform is not supported.\n\nDetails: {}",
                truncate_str(detail, ERROR_SNIPPET_CHARS)
            ),
            Self::ExtractionFailed {
                reason: ExtractionFailure::Timeout,
                ..
            } => "⏱ The download took too long and was stopped. Try a shorter clip.".to_string(),
            Self::ExtractionFailed { reason, detail } => format!(
                "❌ Download failed ({reason}): {}\nCheck the link or try another site.",
                truncate_str(detail, ERROR_SNIPPET_CHARS)
            ),
            Self::FileTooLarge { size, limit } => format!(
                "📦 The file is too large ({}). The bot can only send files up to {}.",
                format_megabytes(*size),
                format_megabytes(*limit)
            ),
            Self::DeliveryFailed(detail) => format!(
                "❌ Could not send the file: {}",
                truncate_str(detail, ERROR_SNIPPET_CHARS)
            ),
            Self::Io(e) => format!(
                "❌ Something went wrong: {}",
                truncate_str(e.to_string(), ERROR_SNIPPET_CHARS)
            ),
        }
    }
}
