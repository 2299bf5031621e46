use oxide_media_relay::config::{AUDIO_KEYWORDS, IMAGE_EXTENSIONS};
use oxide_media_relay::error::RelayError;
use oxide_media_relay::media::{classify, extract_first_url, MediaKind};
use proptest::prelude::*;

proptest! {
    #[test]
    fn text_without_scheme_has_no_link(text in "[a-zA-Z0-9 ,.!?/-]{0,200}") {
        prop_assume!(!text.to_lowercase().contains("http"));
        prop_assert!(matches!(extract_first_url(&text), Err(RelayError::NoUrlFound)));
    }

    #[test]
    fn embedded_link_is_found(
        prefix in "[a-zA-Z ]{0,40}",
        host in "[a-z]{3,12}",
        path in "[a-zA-Z0-9_-]{1,20}",
        suffix in "[a-zA-Z ]{0,40}",
    ) {
        let link = format!("https://{host}.com/{path}");
        let text = format!("{prefix} {link} {suffix}");
        let url = extract_first_url(&text).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(url.as_str(), link.as_str());
    }

    #[test]
    fn image_extension_beats_keywords(
        ext_idx in 0..IMAGE_EXTENSIONS.len(),
        kw_idx in 0..AUDIO_KEYWORDS.len(),
        upper in any::<bool>(),
        query in "[a-z0-9=&]{0,16}",
    ) {
        let ext = if upper {
            IMAGE_EXTENSIONS[ext_idx].to_uppercase()
        } else {
            IMAGE_EXTENSIONS[ext_idx].to_string()
        };
        let link = format!("https://cdn.example.com/pics/photo.{ext}?{query}");
        let text = format!("{} {link}", AUDIO_KEYWORDS[kw_idx]);
        let url = extract_first_url(&text).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(classify(&url, &text), MediaKind::Image);
    }

    #[test]
    fn audio_keyword_selects_audio(
        kw_idx in 0..AUDIO_KEYWORDS.len(),
        id in "[a-zA-Z0-9]{6,11}",
    ) {
        let text = format!("{} https://www.youtube.com/watch?v={id}", AUDIO_KEYWORDS[kw_idx].to_uppercase());
        let url = extract_first_url(&text).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(classify(&url, &text), MediaKind::Audio);
    }
}
