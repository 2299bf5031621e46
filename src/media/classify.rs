//! Decide between image, audio and video for a link.

use super::MediaKind;
use crate::config::{AUDIO_KEYWORDS, IMAGE_EXTENSIONS};
use reqwest::Url;

/// Classify a request from its URL and the surrounding message.
///
/// Rules, in order:
/// 1. URL path ends with a known image extension → [`MediaKind::Image`]
///    (keywords are ignored).
/// 2. Message mentions an audio keyword → [`MediaKind::Audio`].
/// 3. Otherwise → [`MediaKind::Video`].
///
/// # Examples
///
/// ```
/// use oxide_media_relay::media::{classify, MediaKind};
/// use reqwest::Url;
///
/// let url = Url::parse("https://youtu.be/abc").unwrap();
/// assert_eq!(classify(&url, "mp3 please https://youtu.be/abc"), MediaKind::Audio);
/// ```
#[must_use]
pub fn classify(url: &Url, text: &str) -> MediaKind {
    if has_image_extension(url) {
        MediaKind::Image
    } else if mentions_audio(text) {
        MediaKind::Audio
    } else {
        MediaKind::Video
    }
}

/// Whether the URL path (query and fragment excluded) ends in an image extension
fn has_image_extension(url: &Url) -> bool {
    url.path()
        .rsplit('/')
        .next()
        .and_then(|segment| segment.rsplit_once('.'))
        .is_some_and(|(_, ext)| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

fn mentions_audio(text: &str) -> bool {
    let lowered = text.to_lowercase();
    AUDIO_KEYWORDS.iter().any(|kw| lowered.contains(kw))
}
