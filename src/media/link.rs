//! Link extraction from free-form chat text.

// lazy_regex! validates the pattern at compile time and initializes it on first use
#![allow(clippy::non_std_lazy_statics)]

use crate::error::RelayError;
use lazy_regex::lazy_regex;
use reqwest::Url;

/// Match an `http://` or `https://` token up to the next whitespace
static RE_URL: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"(?i)https?://\S+");

/// Characters that end a sentence or close a bracket rather than the link
const TRAILING_PUNCTUATION: &[char] = &[
    '.', ',', ';', ':', '!', '?', ')', ']', '}', '>', '"', '\'',
];

/// Pull the first URL out of a message.
///
/// Punctuation glued to the end of the link ("see https://x.y/z.") is
/// trimmed. Reachability is not checked.
///
/// # Examples
///
/// ```
/// use oxide_media_relay::media::extract_first_url;
/// let url = extract_first_url("look: https://youtu.be/dQw4w9WgXcQ!").unwrap();
/// assert_eq!(url.as_str(), "https://youtu.be/dQw4w9WgXcQ");
/// ```
///
/// # Errors
///
/// Returns [`RelayError::NoUrlFound`] if the text has no link-shaped token
/// and [`RelayError::InvalidUrl`] if the token does not parse or has no host.
pub fn extract_first_url(text: &str) -> Result<Url, RelayError> {
    let candidate = RE_URL
        .find(text)
        .map(|m| m.as_str().trim_end_matches(TRAILING_PUNCTUATION))
        .ok_or(RelayError::NoUrlFound)?;

    let url = Url::parse(candidate).map_err(|_| RelayError::InvalidUrl(candidate.to_string()))?;

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(RelayError::InvalidUrl(candidate.to_string())),
    }
}
